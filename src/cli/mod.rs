// Command line surface: the clap definition and the string-backed enums it parses.
pub mod args;
pub mod type_enums;
