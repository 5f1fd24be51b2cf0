//! The process-wide resource accounting table.
//!
//! Tracks total and available memory, CPU, and storage. Allocation is
//! first-fit against availability and atomic: all three classes are checked
//! before any of them is debited, so no partial reservation is ever
//! observable. At every point `allocated + available == total` holds for
//! each class.

use chrono::{DateTime, Utc};
use shared_types::capability::names;
use shared_types::{ResourceAllocation, ResourceKind, ResourceSnapshot, UsageMetrics};
use std::collections::HashMap;

/// Per-capability default requirements, used when the provider did not
/// specify a reservation.
pub fn default_requirements(capability: &str) -> ResourceAllocation {
    match capability {
        names::TEXT_GENERATION => ResourceAllocation {
            memory_mb: 512,
            cpu_percent: 100,
            storage_mb: 100,
        },
        names::MEDIA_PROCESSING => ResourceAllocation {
            memory_mb: 1024,
            cpu_percent: 200,
            storage_mb: 500,
        },
        names::UI_RENDERING => ResourceAllocation {
            memory_mb: 384,
            cpu_percent: 100,
            storage_mb: 100,
        },
        names::DATA_ANALYSIS => ResourceAllocation {
            memory_mb: 768,
            cpu_percent: 150,
            storage_mb: 100,
        },
        _ => ResourceAllocation {
            memory_mb: 256,
            cpu_percent: 50,
            storage_mb: 100,
        },
    }
}

/// One cell's row in the accounting table.
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    /// What is currently debited from the pool.
    pub reserved: ResourceAllocation,
    /// The full reservation, re-established on resume.
    pub original: ResourceAllocation,
    pub usage: UsageMetrics,
    pub allocated_at: DateTime<Utc>,
    pub suspended_at: Option<DateTime<Utc>>,
}

/// Outcome of an attempted reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub resource: ResourceKind,
    pub available: u64,
    pub requested: u64,
}

/// The accounting table itself. Callers wrap it in a single lock; all
/// operations here are synchronous and infallible except for shortfalls.
#[derive(Debug)]
pub struct ResourceTable {
    total: ResourceAllocation,
    available: ResourceAllocation,
    allocations: HashMap<String, AllocationRecord>,
}

impl ResourceTable {
    pub fn new(total: ResourceAllocation) -> Self {
        Self {
            total,
            available: total,
            allocations: HashMap::new(),
        }
    }

    /// Reserve resources for a cell. Re-allocating for a cell that already
    /// holds a reservation returns the existing one unchanged.
    pub fn allocate(
        &mut self,
        cell_id: &str,
        requested: ResourceAllocation,
    ) -> Result<ResourceAllocation, Shortfall> {
        if let Some(record) = self.allocations.get(cell_id) {
            return Ok(record.reserved);
        }

        self.check_available(requested)?;

        self.available.memory_mb -= requested.memory_mb;
        self.available.cpu_percent -= requested.cpu_percent;
        self.available.storage_mb -= requested.storage_mb;

        self.allocations.insert(
            cell_id.to_string(),
            AllocationRecord {
                reserved: requested,
                original: requested,
                usage: UsageMetrics::default(),
                allocated_at: Utc::now(),
                suspended_at: None,
            },
        );

        Ok(requested)
    }

    /// Shrink a suspended cell's reservation to 20% memory / 10% CPU of the
    /// original, returning the remainder to the pool. Storage is kept.
    pub fn reduce_for_suspend(&mut self, cell_id: &str) -> Option<ResourceAllocation> {
        let record = self.allocations.get_mut(cell_id)?;

        let reduced = ResourceAllocation {
            memory_mb: record.original.memory_mb * 20 / 100,
            cpu_percent: record.original.cpu_percent * 10 / 100,
            storage_mb: record.original.storage_mb,
        };

        self.available.memory_mb += record.reserved.memory_mb - reduced.memory_mb;
        self.available.cpu_percent += record.reserved.cpu_percent - reduced.cpu_percent;

        record.reserved = reduced;
        record.suspended_at = Some(Utc::now());
        Some(reduced)
    }

    /// Re-reserve the full original allocation of a suspended cell.
    /// `None` when the cell holds no reservation at all.
    pub fn restore_for_resume(
        &mut self,
        cell_id: &str,
    ) -> Option<Result<ResourceAllocation, Shortfall>> {
        let record = self.allocations.get(cell_id)?.clone();

        let delta = ResourceAllocation {
            memory_mb: record.original.memory_mb - record.reserved.memory_mb,
            cpu_percent: record.original.cpu_percent - record.reserved.cpu_percent,
            storage_mb: 0,
        };
        if let Err(shortfall) = self.check_available(delta) {
            return Some(Err(shortfall));
        }

        self.available.memory_mb -= delta.memory_mb;
        self.available.cpu_percent -= delta.cpu_percent;

        let record = self.allocations.get_mut(cell_id).expect("present above");
        record.reserved = record.original;
        record.suspended_at = None;
        Some(Ok(record.reserved))
    }

    /// Return a cell's entire reservation to the pool. Idempotent.
    pub fn release(&mut self, cell_id: &str) -> Option<ResourceAllocation> {
        let record = self.allocations.remove(cell_id)?;
        self.available.memory_mb += record.reserved.memory_mb;
        self.available.cpu_percent += record.reserved.cpu_percent;
        self.available.storage_mb += record.reserved.storage_mb;
        Some(record.reserved)
    }

    /// Fold a dispatch result's observed usage into the cell's peaks.
    pub fn update_usage(&mut self, cell_id: &str, memory_used_mb: f64, cpu_percent: Option<f64>) {
        if let Some(record) = self.allocations.get_mut(cell_id) {
            record.usage.memory_peak_mb = record.usage.memory_peak_mb.max(memory_used_mb);
            if let Some(cpu) = cpu_percent {
                record.usage.cpu_peak_percent = record.usage.cpu_peak_percent.max(cpu);
            }
            record.usage.last_updated = Some(Utc::now());
        }
    }

    pub fn usage(&self, cell_id: &str) -> Option<(ResourceAllocation, UsageMetrics)> {
        self.allocations
            .get(cell_id)
            .map(|record| (record.reserved, record.usage.clone()))
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            memory_total_mb: self.total.memory_mb,
            memory_available_mb: self.available.memory_mb,
            cpu_total_percent: self.total.cpu_percent,
            cpu_available_percent: self.available.cpu_percent,
            storage_total_mb: self.total.storage_mb,
            storage_available_mb: self.available.storage_mb,
            active_allocations: self.allocations.len(),
        }
    }

    fn check_available(&self, requested: ResourceAllocation) -> Result<(), Shortfall> {
        if requested.memory_mb > self.available.memory_mb {
            return Err(Shortfall {
                resource: ResourceKind::Memory,
                available: self.available.memory_mb,
                requested: requested.memory_mb,
            });
        }
        if requested.cpu_percent > self.available.cpu_percent {
            return Err(Shortfall {
                resource: ResourceKind::Cpu,
                available: self.available.cpu_percent,
                requested: requested.cpu_percent,
            });
        }
        if requested.storage_mb > self.available.storage_mb {
            return Err(Shortfall {
                resource: ResourceKind::Storage,
                available: self.available.storage_mb,
                requested: requested.storage_mb,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ResourceTable {
        ResourceTable::new(ResourceAllocation {
            memory_mb: 2048,
            cpu_percent: 400,
            storage_mb: 1000,
        })
    }

    fn conserved(table: &ResourceTable) -> bool {
        let snapshot = table.snapshot();
        let allocated_memory: u64 = table
            .allocations
            .values()
            .map(|r| r.reserved.memory_mb)
            .sum();
        snapshot.memory_available_mb + allocated_memory == snapshot.memory_total_mb
    }

    #[test]
    fn test_allocate_debits_pool() {
        let mut table = table();
        let reserved = table
            .allocate("cell-a", default_requirements("text_generation"))
            .expect("fits");
        assert_eq!(reserved.memory_mb, 512);
        assert_eq!(table.snapshot().memory_available_mb, 1536);
        assert!(conserved(&table));
    }

    #[test]
    fn test_shortfall_leaves_table_unchanged() {
        let mut table = table();
        table
            .allocate("cell-a", default_requirements("media_processing"))
            .expect("fits");
        let before = table.snapshot();

        let err = table
            .allocate(
                "cell-b",
                ResourceAllocation {
                    memory_mb: 4096,
                    cpu_percent: 10,
                    storage_mb: 10,
                },
            )
            .expect_err("cannot fit");
        assert_eq!(err.resource, ResourceKind::Memory);
        assert_eq!(table.snapshot(), before, "failed allocation must not mutate");
    }

    #[test]
    fn test_cpu_shortfall_reported_even_when_memory_fits() {
        let mut table = table();
        let err = table
            .allocate(
                "cell-a",
                ResourceAllocation {
                    memory_mb: 10,
                    cpu_percent: 500,
                    storage_mb: 10,
                },
            )
            .expect_err("cpu cannot fit");
        assert_eq!(err.resource, ResourceKind::Cpu);
    }

    #[test]
    fn test_suspend_reduces_to_20_and_10_percent() {
        let mut table = table();
        table
            .allocate("cell-a", default_requirements("text_generation"))
            .expect("fits");

        let reduced = table.reduce_for_suspend("cell-a").expect("allocated");
        assert_eq!(reduced.memory_mb, 102); // 512 * 20%
        assert_eq!(reduced.cpu_percent, 10); // 100 * 10%
        assert_eq!(reduced.storage_mb, 100); // storage kept
        assert_eq!(table.snapshot().memory_available_mb, 2048 - 102);
        assert!(conserved(&table));
    }

    #[test]
    fn test_resume_restores_original() {
        let mut table = table();
        table
            .allocate("cell-a", default_requirements("text_generation"))
            .expect("fits");
        table.reduce_for_suspend("cell-a").expect("allocated");

        let restored = table
            .restore_for_resume("cell-a")
            .expect("allocated")
            .expect("fits again");
        assert_eq!(restored, default_requirements("text_generation"));
        assert_eq!(table.snapshot().memory_available_mb, 1536);
    }

    #[test]
    fn test_resume_fails_when_pool_drained() {
        let mut table = table();
        table
            .allocate("cell-a", default_requirements("media_processing"))
            .expect("fits");
        table.reduce_for_suspend("cell-a").expect("allocated");

        // Someone else takes the freed headroom.
        table
            .allocate(
                "cell-b",
                ResourceAllocation {
                    memory_mb: 1500,
                    cpu_percent: 300,
                    storage_mb: 100,
                },
            )
            .expect("fits in freed space");

        let err = table
            .restore_for_resume("cell-a")
            .expect("allocated")
            .expect_err("no headroom");
        assert_eq!(err.resource, ResourceKind::Memory);
        assert!(conserved(&table));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut table = table();
        table
            .allocate("cell-a", default_requirements("ui_rendering"))
            .expect("fits");
        assert!(table.release("cell-a").is_some());
        assert!(table.release("cell-a").is_none());
        assert_eq!(table.snapshot().memory_available_mb, 2048);
    }

    #[test]
    fn test_usage_peaks_are_monotonic() {
        let mut table = table();
        table
            .allocate("cell-a", default_requirements("data_analysis"))
            .expect("fits");
        table.update_usage("cell-a", 120.0, Some(40.0));
        table.update_usage("cell-a", 80.0, Some(60.0));

        let (_, usage) = table.usage("cell-a").expect("allocated");
        assert_eq!(usage.memory_peak_mb, 120.0);
        assert_eq!(usage.cpu_peak_percent, 60.0);
        assert!(usage.last_updated.is_some());
    }
}
