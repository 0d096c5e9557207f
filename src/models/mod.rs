pub mod report;

pub use report::{
    HealthStatus, OverallAssessment, TyreAnalysisReport, WearCondition, Zone, ZoneAssessment,
    ZoneBreakdown,
};
