pub mod checksum;
pub mod memo;
pub mod pool;
pub mod retry;
pub mod validating_stream;
