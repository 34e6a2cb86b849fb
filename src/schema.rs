/// Column-name constants for the bunker-analytics schema.
/// Single source of truth - exported to Python via PyO3.

// ── Operation columns ───────────────────────────────────────────────────────
pub mod ops {
    pub const BUNKERING_PORT: &str = "bunkering_port";
    pub const CODE: &str = "code";
    pub const START_OF_SERVICE: &str = "start_of_service";
    pub const VESSEL_INSIDE_PORT: &str = "vessel_inside_port";
    pub const SERVICE_TIME: &str = "service_time";
    pub const BARGE_IMO: &str = "barge_imo";
    pub const BARGE_BUILT: &str = "BargeBuilt";
    pub const CON_TYPE: &str = "ConType";

    // Derived at load
    pub const WAITING_TIME: &str = "waiting_time";
    pub const BARGE_AGE_AT_OP: &str = "barge_age_at_op";

    pub const REQUIRED: [&str; 8] = [
        BUNKERING_PORT,
        CODE,
        START_OF_SERVICE,
        VESSEL_INSIDE_PORT,
        SERVICE_TIME,
        BARGE_IMO,
        BARGE_BUILT,
        CON_TYPE,
    ];
}

// ── Price columns ───────────────────────────────────────────────────────────
pub mod price {
    pub const DATE: &str = "Date";
    pub const PRICE: &str = "Price";
}

// ── Port position columns ───────────────────────────────────────────────────
pub mod port {
    pub const PORT_CODE: &str = "PortCode";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const LAT: &str = "Lat";
    pub const LONG: &str = "Long";
}

// ── Metric values ───────────────────────────────────────────────────────────
pub mod metric {
    pub const SERVICE: &str = "service";
    pub const WAITING: &str = "waiting";
}
