mod atomic;

pub use atomic::{
    is_temp_name, write_atomic, write_atomic_async, write_atomic_with, write_new_atomic,
    write_new_atomic_async, TEMP_PREFIX,
};
