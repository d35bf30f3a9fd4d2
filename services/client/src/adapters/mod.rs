pub mod appwrite;
pub mod memory;

pub use appwrite::AppwriteAdapter;
pub use memory::MemoryBackend;
