use super::task::sleep_or_cancel;
use crate::core::config::{BackpressurePolicy, SimulationConfig};
use crate::core::connections::Topology;
use crate::core::event::EventKind;
use crate::core::event_bus::EventBus;
use crate::core::line::Line;
use crate::core::model::{Machine, MachineStatus, Product, ProductStatus};
use crate::core::types::{NodeId, ProductId};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cadence settings a worker reads once at spawn time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerTiming {
    pub idle_poll: Duration,
    pub flash: Duration,
    pub backpressure: BackpressurePolicy,
}

impl WorkerTiming {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            idle_poll: config.idle_poll_interval,
            flash: config.flash_duration,
            backpressure: config.backpressure,
        }
    }
}

/// Result of trying to pass a finished product downstream
#[derive(Debug, Clone, PartialEq)]
enum HandOff {
    Moved { queue_id: NodeId, product_id: ProductId },
    Completed { product_id: ProductId },
    Requeued { queue_id: NodeId, product_id: ProductId },
    /// Nowhere to put it; still held by the machine
    Held,
    /// Machine or product disappeared underneath the worker
    Missing,
}

/// What the worker needs to know about the held product
struct Job {
    product_id: ProductId,
    color: String,
    min: u64,
    max: u64,
    reliability: f64,
    service_elapsed: Option<u64>,
}

/// Autonomous processing loop for one machine.
///
/// Idle -> Processing (-> Maintenance -> Processing) -> Flashing -> Idle. The machine record
/// is the only state; a worker spawned on a machine that already holds a product picks the
/// product back up, so pause/resume and restore never lose work in progress.
pub struct MachineWorker {
    machine_id: NodeId,
    line: Arc<Line>,
    bus: Arc<EventBus>,
    timing: WorkerTiming,
    rng: StdRng,
    /// Rotates the first input queue polled, so no input starves
    cursor: usize,
}

impl MachineWorker {
    pub fn new(
        machine_id: NodeId,
        line: Arc<Line>,
        bus: Arc<EventBus>,
        timing: WorkerTiming,
        rng: StdRng,
    ) -> Self {
        Self {
            machine_id,
            line,
            bus,
            timing,
            rng,
            cursor: 0,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("[Machine:{}] Worker started", self.machine_id);
        self.settle_flash();

        while !cancel.is_cancelled() {
            let keep_going = match self.holds_product() {
                None => {
                    debug!("[Machine:{}] Removed from the line", self.machine_id);
                    false
                }
                Some(true) => self.process(&cancel).await,
                Some(false) => {
                    if self.acquire() {
                        true
                    } else {
                        self.mark_idle();
                        sleep_or_cancel(&cancel, self.timing.idle_poll).await
                    }
                }
            };
            if !keep_going {
                break;
            }
        }

        info!("[Machine:{}] Worker stopped", self.machine_id);
    }

    /// Serve the held product, then hand it off. Returns `false` when the worker should exit.
    ///
    /// A product whose service already ran (it was waiting on a full output when the worker
    /// stopped) goes straight back to the hand-off.
    async fn process(&mut self, cancel: &CancellationToken) -> bool {
        let Some(job) = self.job() else {
            return false;
        };

        let elapsed_ms = match job.service_elapsed {
            Some(elapsed_ms) => {
                debug!(
                    "[Machine:{}] {} already served, retrying hand-off",
                    self.machine_id, job.product_id
                );
                elapsed_ms
            }
            None => match self.serve(cancel, &job).await {
                Some(elapsed_ms) => elapsed_ms,
                None => return false,
            },
        };

        self.deliver(cancel, elapsed_ms).await
    }

    /// Run the service time, with a possible breakdown first. `None` on cancellation.
    async fn serve(&mut self, cancel: &CancellationToken, job: &Job) -> Option<u64> {
        let service_ms = if job.max > job.min {
            Uniform::new(job.min, job.max).sample(&mut self.rng)
        } else {
            job.min
        };
        let breaks_down = Bernoulli::new(1.0 - job.reliability)
            .map(|d| d.sample(&mut self.rng))
            .unwrap_or(false);

        self.enter_processing(job);
        if breaks_down {
            let repair_ms = service_ms.saturating_mul(2);
            warn!(
                "[Machine:{}] Breakdown, repairing for {} ms",
                self.machine_id, repair_ms
            );
            self.set_status(MachineStatus::Maintenance);
            self.bus.publish(EventKind::MachineBreakdown {
                machine_id: self.machine_id.clone(),
                repair_ms,
            });
            if !sleep_or_cancel(cancel, Duration::from_millis(repair_ms)).await {
                return None;
            }
            self.enter_processing(job);
        }

        let started = Instant::now();
        if !sleep_or_cancel(cancel, Duration::from_millis(service_ms)).await {
            return None;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.record_service(elapsed_ms);
        Some(elapsed_ms)
    }

    /// Pass the served product downstream, polling while nothing has room
    async fn deliver(&mut self, cancel: &CancellationToken, elapsed_ms: u64) -> bool {
        loop {
            match self.hand_off(elapsed_ms) {
                HandOff::Moved {
                    queue_id,
                    product_id,
                } => {
                    self.bus.publish(EventKind::ProductMoved {
                        machine_id: self.machine_id.clone(),
                        queue_id,
                        product_id,
                    });
                    return self.flash(cancel).await;
                }
                HandOff::Completed { product_id } => {
                    self.bus.publish(EventKind::ProductCompleted {
                        machine_id: self.machine_id.clone(),
                        product_id,
                    });
                    return self.flash(cancel).await;
                }
                HandOff::Requeued {
                    queue_id,
                    product_id,
                } => {
                    self.bus.publish(EventKind::ProductRequeued {
                        machine_id: self.machine_id.clone(),
                        queue_id,
                        product_id,
                    });
                    self.bus.publish(EventKind::MachineIdle {
                        machine_id: self.machine_id.clone(),
                    });
                    return sleep_or_cancel(cancel, self.timing.idle_poll).await;
                }
                HandOff::Held => {
                    if !sleep_or_cancel(cancel, self.timing.idle_poll).await {
                        return false;
                    }
                }
                HandOff::Missing => return true,
            }
        }
    }

    async fn flash(&mut self, cancel: &CancellationToken) -> bool {
        self.bus.publish(EventKind::MachineFlash {
            machine_id: self.machine_id.clone(),
        });
        if !sleep_or_cancel(cancel, self.timing.flash).await {
            return false;
        }
        self.mark_idle();
        true
    }

    fn holds_product(&self) -> Option<bool> {
        let machine = self.line.topology().machine(&self.machine_id)?;
        let held = machine.lock().current_product.is_some();
        Some(held)
    }

    fn job(&self) -> Option<Job> {
        let machine = self.line.topology().machine(&self.machine_id)?;
        let machine = machine.lock();
        let product = machine.current_product.as_ref()?;
        Some(Job {
            product_id: product.id.clone(),
            color: product.color.clone(),
            min: machine.min_service_time,
            max: machine.max_service_time,
            reliability: machine.reliability,
            service_elapsed: machine.service_elapsed,
        })
    }

    /// Every entry into Processing is announced, including the one after a repair
    fn enter_processing(&self, job: &Job) {
        self.set_status(MachineStatus::Processing);
        self.bus.publish(EventKind::MachineProcessing {
            machine_id: self.machine_id.clone(),
            product_id: job.product_id.clone(),
            color: job.color.clone(),
        });
    }

    fn record_service(&self, elapsed_ms: u64) {
        if let Some(machine) = self.line.topology().machine(&self.machine_id) {
            let mut machine = machine.lock();
            if machine.current_product.is_some() {
                machine.service_elapsed = Some(elapsed_ms);
            }
        }
    }

    fn set_status(&self, status: MachineStatus) -> Option<MachineStatus> {
        let machine = self.line.topology().machine(&self.machine_id)?;
        let mut machine = machine.lock();
        let previous = machine.status;
        machine.status = status;
        Some(previous)
    }

    /// A worker resumed mid-flash has nothing left to show
    fn settle_flash(&self) {
        let Some(machine) = self.line.topology().machine(&self.machine_id) else {
            return;
        };
        let mut machine = machine.lock();
        if machine.status == MachineStatus::Flashing && machine.current_product.is_none() {
            machine.status = MachineStatus::Idle;
        }
    }

    /// Go Idle, announcing it only on an actual transition
    fn mark_idle(&self) {
        let previous = self.set_status(MachineStatus::Idle);
        if matches!(previous, Some(status) if status != MachineStatus::Idle) {
            debug!("[Machine:{}] Idle", self.machine_id);
            self.bus.publish(EventKind::MachineIdle {
                machine_id: self.machine_id.clone(),
            });
        }
    }

    /// Take the next product from the input queues. Returns whether one was taken.
    fn acquire(&mut self) -> bool {
        let topology = self.line.topology();
        let Some(machine) = topology.machine(&self.machine_id) else {
            return false;
        };
        let _gate = self.line.transfer();
        let mut machine = machine.lock();
        if machine.current_product.is_some() {
            return false;
        }

        let inputs: Vec<NodeId> = machine.input_queue_ids.iter().cloned().collect();
        if inputs.is_empty() {
            return false;
        }
        let start = self.cursor % inputs.len();
        self.cursor = self.cursor.wrapping_add(1);

        for queue_id in inputs.iter().cycle().skip(start).take(inputs.len()) {
            let Some(buffer) = topology.buffer(queue_id) else {
                continue;
            };
            if let Some(mut product) = buffer.dequeue() {
                product.status = ProductStatus::Processing;
                debug!(
                    "[Machine:{}] Took {} from {}",
                    self.machine_id, product.id, queue_id
                );
                machine.hold(product);
                machine.source_queue_id = Some(queue_id.clone());
                return true;
            }
        }
        false
    }

    fn hand_off(&self, elapsed_ms: u64) -> HandOff {
        let topology = self.line.topology();
        let Some(machine) = topology.machine(&self.machine_id) else {
            return HandOff::Missing;
        };
        let _gate = self.line.transfer();
        let mut machine = machine.lock();
        let Some(mut product) = machine.release() else {
            return HandOff::Missing;
        };
        let product_id = product.id.clone();

        let Some(queue_id) = machine.output_queue_id.clone() else {
            product.status = ProductStatus::Completed;
            self.line.end().lock().completed_count += 1;
            Self::finish(&mut machine, elapsed_ms);
            debug!("[Machine:{}] Completed {}", self.machine_id, product_id);
            return HandOff::Completed { product_id };
        };

        let rejected = match topology.buffer(&queue_id) {
            Some(buffer) => match buffer.try_enqueue(product) {
                Ok(()) => {
                    Self::finish(&mut machine, elapsed_ms);
                    return HandOff::Moved {
                        queue_id,
                        product_id,
                    };
                }
                Err(product) => product,
            },
            None => product,
        };

        if self.timing.backpressure == BackpressurePolicy::RequeueToInput {
            match self.requeue(&topology, &machine, rejected) {
                Ok(input_id) => {
                    warn!(
                        "[Machine:{}] Output {} full, returned {} to {}",
                        self.machine_id, queue_id, product_id, input_id
                    );
                    machine.status = MachineStatus::Idle;
                    machine.source_queue_id = None;
                    return HandOff::Requeued {
                        queue_id: input_id,
                        product_id,
                    };
                }
                Err(product) => machine.hold(product),
            }
        } else {
            machine.hold(rejected);
        }
        machine.service_elapsed = Some(elapsed_ms);

        debug!(
            "[Machine:{}] Output {} full, holding {}",
            self.machine_id, queue_id, product_id
        );
        HandOff::Held
    }

    /// Put a rejected product back into the queue it came from, or any other input with room
    fn requeue(
        &self,
        topology: &Topology,
        machine: &Machine,
        product: Product,
    ) -> Result<NodeId, Product> {
        let candidates = machine
            .source_queue_id
            .iter()
            .chain(machine.input_queue_ids.iter())
            .cloned()
            .collect::<Vec<_>>();

        let mut product = product;
        for queue_id in candidates {
            let Some(buffer) = topology.buffer(&queue_id) else {
                continue;
            };
            match buffer.try_enqueue(product) {
                Ok(()) => return Ok(queue_id),
                Err(rejected) => product = rejected,
            }
        }
        Err(product)
    }

    fn finish(machine: &mut Machine, elapsed_ms: u64) {
        machine.processed_count += 1;
        machine.total_processing_time += elapsed_ms;
        machine.source_queue_id = None;
        machine.status = MachineStatus::Flashing;
    }
}
