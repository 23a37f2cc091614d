use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("invalid or closed handle")]
    InvalidHandle,
    #[error("no volume mounted")]
    NotMounted,
    #[error("device is not formatted with this filesystem")]
    NotFormatted,
    #[error("no free data block")]
    NoSpace,
    #[error("no free inode")]
    NoFreeInode,
    #[error("device I/O error")]
    IoError,
    #[error("no such file or directory")]
    NotFound,
    #[error("wrong file type")]
    WrongType,
    #[error("descriptor table full")]
    TableFull,
    #[error("invalid block size or device too small")]
    InvalidGeometry,
    #[error("invalid path")]
    InvalidPath,
    #[error("invalid file name")]
    InvalidName,
    #[error("name already exists")]
    AlreadyExists,
    #[error("file too large")]
    FileTooLarge,
    #[error("filesystem busy")]
    Busy,
}

pub type Result<T> = core::result::Result<T, FsError>;

// Record (de)serialization only fails on short buffers, which surface as device errors.
impl From<std::io::Error> for FsError {
    fn from(_: std::io::Error) -> Self {
        FsError::IoError
    }
}
