#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::Mutex;
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use std::sync::Mutex;
}

pub(crate) use imp::*;
