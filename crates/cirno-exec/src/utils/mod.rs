mod procfs;
pub use procfs::descendants;
