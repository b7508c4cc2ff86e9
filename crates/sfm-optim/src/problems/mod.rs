//! Problem drivers built on the IR, builder and backends.

pub mod bundle_adjust;
