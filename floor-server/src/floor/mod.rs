//! Floor entities: plans, tables, the table optimizer and the walk-in waitlist

pub mod floor_plan;
pub mod optimizer;
pub mod table;
pub mod waitlist;

pub use floor_plan::{FloorPlan, FloorPlanHandle};
pub use optimizer::{OptimizableTableUpdate, OptimizerHandle, TableOptimizer};
pub use table::{Table, TableHandle};
pub use waitlist::{Waitlist, WaitlistHandle};
