mod simulation_tests;
mod worker_tests;
