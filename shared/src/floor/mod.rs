//! Floor domain types: tables, floor plans, optimizer, waitlist

pub mod floor_plan;
pub mod optimizer;
pub mod table;
pub mod waitlist;

pub use floor_plan::{FloorPlanCreate, FloorPlanSnapshot, FloorPlanUpdate, FloorSection};
pub use optimizer::{
    AssignmentRequest, AssignmentResult, OptimizableTable, OptimizerSnapshot, ServerSection,
    ServerWorkload, TableRecommendation,
};
pub use table::{TableCreate, TableEvent, TableShape, TableSnapshot, TableStatus, TableUpdate};
pub use waitlist::{WaitlistAdd, WaitlistEntry, WaitlistSnapshot, WaitlistStatus};
