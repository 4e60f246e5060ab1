//! Poison-tolerant lock helpers. A panicking handler thread must not take the
//! connection's bookkeeping down with it.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read_ignore_poison<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_ignore_poison<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{lock_ignore_poison, read_ignore_poison, write_ignore_poison};
    use std::sync::{Arc, Mutex, RwLock};
    use std::thread;

    #[test]
    fn poisoned_mutex_is_still_usable() {
        let shared = Arc::new(Mutex::new(1_u32));
        let poisoner = Arc::clone(&shared);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().expect("first lock");
            panic!("handler panicked while holding the lock");
        })
        .join();
        assert!(shared.is_poisoned());

        *lock_ignore_poison(&shared) += 1;
        assert_eq!(*lock_ignore_poison(&shared), 2);
    }

    #[test]
    fn poisoned_rwlock_is_still_usable() {
        let shared = Arc::new(RwLock::new(Vec::<u8>::new()));
        let poisoner = Arc::clone(&shared);
        let _ = thread::spawn(move || {
            let _guard = poisoner.write().expect("first write");
            panic!("handler panicked while holding the lock");
        })
        .join();

        write_ignore_poison(&shared).push(7);
        assert_eq!(read_ignore_poison(&shared).as_slice(), &[7]);
    }
}
