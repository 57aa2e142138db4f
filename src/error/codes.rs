/// Error code registry for treeforge
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Composition and template errors
/// - 3000-3999: Container and bundle output errors
/// - 4000-4999: Merge errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;

    // Composition errors (2000-2999)
    pub const COMPOSE_UNKNOWN_SLOT: u16 = 2001;
    pub const COMPOSE_DUPLICATE_DECLARATION: u16 = 2002;
    pub const COMPOSE_UNRESOLVED_REFERENCE: u16 = 2003;
    pub const COMPOSE_DUPLICATE_COLUMN: u16 = 2004;
    pub const COMPOSE_INVALID_SKELETON: u16 = 2005;
    pub const COMPOSE_TEMPLATE_ERROR: u16 = 2006;
    pub const COMPOSE_MISSING_ENTRY_POINT: u16 = 2007;
    pub const TEMPLATE_SET_UNKNOWN: u16 = 2010;
    pub const TEMPLATE_SET_INVALID: u16 = 2011;

    // Container errors (3000-3999)
    pub const CONTAINER_OPEN_FAILED: u16 = 3001;
    pub const CONTAINER_BAD_MAGIC: u16 = 3002;
    pub const CONTAINER_INVALID_NAME: u16 = 3003;
    pub const CONTAINER_DUPLICATE_KEY: u16 = 3004;
    pub const CONTAINER_NO_SUCH_DIRECTORY: u16 = 3005;
    pub const CONTAINER_INVALID_TREE: u16 = 3006;
    pub const CONTAINER_ENCODE_FAILED: u16 = 3007;
    pub const CONTAINER_WRITE_FAILED: u16 = 3008;
    pub const BUNDLE_WRITE_FAILED: u16 = 3010;

    // Merge errors (4000-4999)
    pub const MERGE_INPUT_OPEN: u16 = 4001;
    pub const MERGE_SUB_PATH_NOT_FOUND: u16 = 4002;
    pub const MERGE_NO_READABLE_ENTRIES: u16 = 4003;
    pub const MERGE_OUTPUT_FAILED: u16 = 4004;
    pub const MERGE_CONFLICTING_OUTPUTS: u16 = 4005;
    pub const MERGE_TASK_FAILED: u16 = 4006;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
    pub const OTHER_IO: u16 = 9001;
    pub const OTHER_INVALID_INPUT: u16 = 9002;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Configuration error",

        2001 => "Fragments supplied for an undefined slot",
        2002 => "Variable declared more than once",
        2003 => "Variable used but never declared",
        2004 => "Column bound more than once on the same table",
        2005 => "Invalid skeleton",
        2006 => "Template rendering failed",
        2007 => "Module source lacks a lifecycle entry point",
        2010 => "Unknown template set",
        2011 => "Invalid template set",

        3001 => "Cannot open container",
        3002 => "File is not a container",
        3003 => "Invalid entry name",
        3004 => "Duplicate entry name",
        3005 => "Directory not found in container",
        3006 => "Invalid tree",
        3007 => "Failed to encode entry",
        3008 => "Failed to write container",
        3010 => "Failed to write bundle",

        4001 => "Cannot open merge input",
        4002 => "Sub-path not found in input",
        4003 => "No readable entries under sub-path",
        4004 => "Failed to write merge output",
        4005 => "Several merges target the same output",
        4006 => "Merge task failed",

        9000 => "Generic error",
        9001 => "I/O error",
        9002 => "Invalid input file",

        _ => "Unknown error code",
    }
}
