#![no_main]

//! Fuzz target for container lifecycle
//!
//! Interleaves extension registration, init and dispose with binding
//! operations. Once disposed, every operation must report it.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use simple_container::{Container, DiError, Extension, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

struct Counting {
    inits: AtomicU32,
    fail_init: bool,
}

impl Extension for Counting {
    fn on_init(&self, _: &Container) -> Result<()> {
        if self.fail_init {
            return Err(DiError::extension::<Self>("refused"));
        }
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Value(u32);

#[derive(Debug, Arbitrary)]
enum LifecycleOp {
    Register { fail_init: bool },
    Unregister,
    Init,
    Dispose,
    Bind(u32),
    Resolve,
}

fuzz_target!(|ops: Vec<LifecycleOp>| {
    let container = Container::new();
    let mut disposed = false;

    for op in ops {
        match op {
            LifecycleOp::Register { fail_init } => {
                let extension = Arc::new(Counting {
                    inits: AtomicU32::new(0),
                    fail_init,
                });
                let result = container.register_extension(Arc::clone(&extension));
                if disposed {
                    assert!(matches!(result, Err(DiError::ContainerDisposed)));
                }
                if let Some(registered) = container.extension::<Counting>() {
                    assert!(registered.inits.load(Ordering::SeqCst) <= 1);
                }
            }
            LifecycleOp::Unregister => {
                let result = container.unregister_extension::<Counting>();
                if disposed {
                    assert!(result.is_err());
                }
            }
            LifecycleOp::Init => {
                let result = container.init();
                if disposed {
                    assert!(matches!(result, Err(DiError::ContainerDisposed)));
                } else if result.is_ok() {
                    assert!(container.is_initialized());
                }
            }
            LifecycleOp::Dispose => {
                let result = container.dispose();
                if disposed {
                    assert!(matches!(result, Err(DiError::ContainerDisposed)));
                }
                if result.is_ok() {
                    disposed = true;
                }
            }
            LifecycleOp::Bind(value) => {
                let result = container.bind_singleton::<Value>().to_instance(Value(value)).done();
                assert_eq!(result.is_err(), disposed);
            }
            LifecycleOp::Resolve => {
                match container.resolve::<Value>() {
                    Ok(value) => {
                        assert!(!disposed);
                        let _ = value.0;
                    }
                    Err(err) => {
                        if disposed {
                            assert!(matches!(err, DiError::ContainerDisposed));
                        }
                    }
                }
            }
        }
    }
});
