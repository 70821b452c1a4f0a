pub mod atomic_writer;
pub mod limits;
pub mod path_guard;

pub use atomic_writer::{write_atomic, write_bytes_atomic, AtomicWriter, DEFAULT_MAX_BYTES};
pub use limits::ResourceLimits;
pub use path_guard::{BoxedPath, SandboxRoot};
