pub mod dash_consts {
    //! Dashboard State Constants
    //!
    //! This module contains the fixed values shared by the bus, the registries,
    //! the index expander and the lifecycle controller, organized by
    //! functional area.

    // =============================================================================
    // EVENT BUS
    // =============================================================================

    /// Channel on which every packet is mirrored once a debug listener registers.
    pub const DEBUG_CHANNEL: &str = "$dashboard_debug";

    /// Channel the controller broadcasts on after recomputing partitions.
    pub const REFRESH_CHANNEL: &str = "refresh";

    /// Channel panels use to report the field names they have seen.
    pub const FIELDS_CHANNEL: &str = "fields";

    /// Wildcard address / group name.
    pub const ALL: &str = "ALL";

    /// Group membership of a listener that declares none.
    pub const DEFAULT_GROUP: &str = "NONE";

    // =============================================================================
    // REGISTRIES
    // =============================================================================

    /// Query colors, assigned by `id % QUERY_COLORS.len()`.
    pub const QUERY_COLORS: [&str; 56] = [
        "#7EB26D", "#EAB839", "#6ED0E0", "#EF843C", "#E24D42", "#1F78C1", "#BA43A9", "#705DA0",
        "#508642", "#CCA300", "#447EBC", "#C15C17", "#890F02", "#0A437C", "#6D1F62", "#584477",
        "#B7DBAB", "#F4D598", "#70DBED", "#F9BA8F", "#F29191", "#82B5D8", "#E5A8E2", "#AEA2E0",
        "#629E51", "#E5AC0E", "#64B0C8", "#E0752D", "#BF1B00", "#0A50A1", "#962D82", "#614D93",
        "#9AC48A", "#F2C96D", "#65C5DB", "#F9934E", "#EA6460", "#5195CE", "#D683CE", "#806EB7",
        "#3F6833", "#967302", "#2F575E", "#99440A", "#58140C", "#052B51", "#511749", "#3F2B5B",
        "#E0F9D7", "#FCEACA", "#CFFAFF", "#F9E2D2", "#FCE2DE", "#BADFF4", "#F9D9F9", "#DEDAF7",
    ];

    /// Query string used when a query is created without one.
    pub const MATCH_EVERYTHING: &str = "*";

    // =============================================================================
    // DASHBOARD DEFAULTS
    // =============================================================================

    /// Static document loaded when nothing else applies.
    pub const DEFAULT_DASHBOARD_FILE: &str = "default.json";

    /// Partition pattern and default partition of the baseline document.
    pub const DEFAULT_PARTITION: &str = "_all";

    /// Index holding saved dashboards in the document store.
    pub const DEFAULT_STORE_INDEX: &str = "kibana-int";

    /// Owner recorded on saved dashboards.
    pub const GUEST: &str = "guest";

    /// Fragment prefix used in shareable links.
    pub const SHARE_FRAGMENT: &str = "#dashboard";

    // =============================================================================
    // NETWORK CONFIGURATION
    // =============================================================================

    /// Remote request configuration
    pub mod network {
        use std::time::Duration;

        /// Default Elasticsearch endpoint
        pub const DEFAULT_ELASTICSEARCH: &str = "http://localhost:9200";

        /// Default GitHub API endpoint for the gist service
        pub const GIST_API_URL: &str = "https://api.github.com";

        /// File name under which dashboards are stored in a gist
        pub const GIST_FILE_NAME: &str = "dashboard.json";

        /// Request timeout (seconds)
        pub const REQUEST_TIMEOUT_SECS: u64 = 10;

        /// Maximum number of attempts for a single request
        pub const MAX_RETRIES: u32 = 3;

        /// Base delay between attempts (milliseconds), multiplied by the attempt number
        pub const RETRY_BACKOFF_MS: u64 = 250;

        /// Helper function to get the backoff before the given attempt
        pub const fn retry_backoff(attempt: u32) -> Duration {
            Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64)
        }
    }
}
