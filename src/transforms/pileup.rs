//! Packs overlapping intervals into lanes.
//!
//! Input must be sorted by start. A decrease in start (e.g. a new
//! chromosome) frees all lanes.
//!
//! The default packer keeps two heaps: active lanes keyed by their end plus
//! spacing, and released lane ids. Each record takes the lowest released
//! lane or opens a new one.
//!
//! With `preference` and `preferredOrder`, a record whose preference value
//! is listed takes the lane of the same index if that lane is free, and the
//! lowest free lane otherwise. This scans the lanes linearly, which is fine
//! for the handful of lanes such layouts (e.g. genes by strand) use.

use crate::batch::FlowBatch;
use crate::datum::{CachedField, Field, Record, Value};
use crate::error::{FlowError, Result};
use crate::flow::{make_mut, Behavior, FlowNode, Output};
use crate::heap::MinHeap;
use crate::params::PileupParams;

/// Maximum number of lanes in preference mode.
pub const MAX_DEPTH: usize = 65536;

#[derive(Debug)]
enum Packer {
    Greedy {
        ends: MinHeap<usize>,
        free_lanes: MinHeap<usize>,
        next_lane: usize,
    },
    Preferred {
        field: Field,
        order: Vec<Value>,
        /// End (plus spacing) of the last interval in each lane.
        lane_ends: Vec<f64>,
    },
}

impl Packer {
    fn clear(&mut self) {
        match self {
            Packer::Greedy {
                ends,
                free_lanes,
                next_lane,
            } => {
                ends.release();
                free_lanes.release();
                *next_lane = 0;
            }
            Packer::Preferred { lane_ends, .. } => *lane_ends = Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Pileup {
    start: CachedField,
    end: CachedField,
    as_field: String,
    spacing: f64,
    packer: Packer,
    last_start: f64,
}

impl Pileup {
    pub fn new(params: &PileupParams) -> Result<Self> {
        let packer = match (&params.preference, &params.preferred_order) {
            (None, None) => Packer::Greedy {
                ends: MinHeap::new(),
                free_lanes: MinHeap::new(),
                next_lane: 0,
            },
            (Some(field), Some(order)) => Packer::Preferred {
                field: Field::new(field),
                order: order.clone(),
                lane_ends: Vec::new(),
            },
            _ => {
                return Err(FlowError::params(
                    "pileup",
                    "must specify both \"preference\" and \"preferredOrder\"",
                ))
            }
        };

        Ok(Self {
            start: CachedField::new(&params.start),
            end: CachedField::new(&params.end),
            as_field: params.as_field.clone().unwrap_or_else(|| "lane".to_string()),
            spacing: params.spacing.unwrap_or(1.0),
            packer,
            last_start: f64::NEG_INFINITY,
        })
    }

    fn coordinate(field: &CachedField, record: &Record) -> Result<f64> {
        field.number(record).ok_or_else(|| {
            FlowError::input(
                "pileup",
                format!("the field \"{}\" is not a number", field.name()),
            )
        })
    }

    fn assign(&mut self, record: &Record, start: f64, end: f64) -> Result<usize> {
        let new_contig = start < self.last_start;
        self.last_start = start;
        let spacing = self.spacing;

        match &mut self.packer {
            Packer::Greedy {
                ends,
                free_lanes,
                next_lane,
            } => {
                while let Some(edge) = ends.peek_priority() {
                    if edge > start && !new_contig {
                        break;
                    }
                    if let Some(lane) = ends.pop() {
                        free_lanes.push(lane, lane as f64);
                    }
                }

                let lane = match free_lanes.pop() {
                    Some(lane) => lane,
                    None => {
                        *next_lane += 1;
                        *next_lane - 1
                    }
                };
                ends.push(lane, end + spacing);
                Ok(lane)
            }

            Packer::Preferred {
                field,
                order,
                lane_ends,
            } => {
                if new_contig {
                    lane_ends.clear();
                }

                let preference = field.value(record);
                let preferred = order.iter().position(|v| v == preference);

                let lane = match preferred {
                    Some(p) if lane_ends.get(p).map_or(true, |&e| e < start) => p,
                    _ => lane_ends
                        .iter()
                        .position(|&e| e < start)
                        .unwrap_or(lane_ends.len()),
                };

                if lane >= MAX_DEPTH {
                    return Err(FlowError::input("pileup", "out of lanes"));
                }
                if lane >= lane_ends.len() {
                    lane_ends.resize(lane + 1, f64::NEG_INFINITY);
                }
                lane_ends[lane] = end + spacing;
                Ok(lane)
            }
        }
    }
}

impl FlowNode for Pileup {
    fn label(&self) -> &str {
        "pileup"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Modifies
    }

    fn handle(&mut self, mut record: Record, out: &mut Output) -> Result<()> {
        let start = Self::coordinate(&self.start, &record)?;
        let end = Self::coordinate(&self.end, &record)?;

        let lane = self.assign(&record, start, end)?;

        make_mut(&mut record).insert(self.as_field.as_str(), lane);
        out.propagate(record);
        Ok(())
    }

    fn begin_batch(&mut self, batch: &FlowBatch, _out: &mut Output) -> Result<()> {
        match batch {
            FlowBatch::File { .. } => {
                self.start.invalidate();
                self.end.invalidate();
            }
            FlowBatch::Facet { .. } => {
                self.packer.clear();
                self.last_start = f64::NEG_INFINITY;
            }
        }
        Ok(())
    }

    fn complete(&mut self, _out: &mut Output) -> Result<()> {
        self.packer.clear();
        Ok(())
    }

    fn reset(&mut self) {
        self.packer.clear();
        self.last_start = f64::NEG_INFINITY;
        self.start.invalidate();
        self.end.invalidate();
    }
}
