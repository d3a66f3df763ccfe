// -
// Row snapshot

/// Synthetic field injected into every row snapshot, holding the zero-based
/// table row index (header row is 0).
pub const ROW_INDEX_FIELD: &str = "RowIndex";

// -
// Rule-definition table keys

pub(crate) const SETTING_SHEET_NAME: &str = "SHEET_NAME";
pub(crate) const SETTING_REFRESH_FREQUENCY: &str = "SHEET_REFRESH_FREQUENCY";
pub(crate) const SETTING_COLUMN_CHECK_FREQUENCY: &str = "SHEET_NEW_COLUMNS_FREQUENCY";
pub(crate) const SETTING_COMPLETION_RATE_LIMIT: &str = "GPT_RATE_LIMIT";
pub(crate) const SETTING_SOURCE_RATE_LIMIT: &str = "SHEETS_RATE_LIMIT";
pub(crate) const SETTING_STATS: &str = "STATS";

/// Rule keys look like `VAR1_TRIGGER_COL`
pub(crate) const RULE_KEY_PREFIX: &str = "VAR";

pub(crate) const RULE_PROP_TRIGGER_COL: &str = "TRIGGER_COL";
pub(crate) const RULE_PROP_SYSTEM_MESSAGE: &str = "SYSTEM_MESSAGE";
pub(crate) const RULE_PROP_USER_MESSAGE: &str = "USER_MESSAGE";
pub(crate) const RULE_PROP_TEMP: &str = "TEMP";
pub(crate) const RULE_PROP_MAX_TOKENS: &str = "MAX_TOKENS";
pub(crate) const RULE_PROP_PROMPT_COL_TO: &str = "PROMPT_COL_TO";

// -
// Stats names, as shown in the stats sheet

pub const STAT_ERRORS: &str = "Errors";
pub const STAT_LAST_ERROR: &str = "Last Error";
pub const STAT_SUCCESSFUL_COMPLETIONS: &str = "Successful Completions";
pub const STAT_ROWS_PROCESSED: &str = "Total Rows Processed";

/// Order in which stats are laid out in the stats sheet
pub const STAT_NAMES: [&str; 4] = [
    STAT_ERRORS,
    STAT_LAST_ERROR,
    STAT_SUCCESSFUL_COMPLETIONS,
    STAT_ROWS_PROCESSED,
];
