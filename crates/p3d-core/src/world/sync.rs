// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reader/writer wrapper for sharing a world across threads.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::World;

/// A [`World`] behind a reader/writer lock.
///
/// Any number of readers (queries, serialization) may run at once; structural
/// mutations take the write side. A panic while holding the lock does not
/// make the world unusable: validity is checked by the mutation itself, so
/// poisoning is cleared on the next acquisition.
#[derive(Debug, Default)]
pub struct SynchronizedWorld {
    inner: RwLock<World>,
}

impl SynchronizedWorld {
    /// Wraps `world`.
    pub fn new(world: World) -> Self {
        Self { inner: RwLock::new(world) }
    }

    /// Shared access; blocks while a writer holds the lock.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access; blocks until every reader is done.
    pub fn write(&self) -> RwLockWriteGuard<'_, World> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under a read lock.
    pub fn with_read<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&self.read())
    }

    /// Runs `f` under the write lock.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        f(&mut self.write())
    }

    /// Unwraps the world.
    pub fn into_inner(self) -> World {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<World> for SynchronizedWorld {
    fn from(world: World) -> Self {
        Self::new(world)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::part::PartProperties;
    use crate::shape::Shape;
    use crate::world::PartsFilter;
    use p3d_geom::{GlobalCFrame, Position};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_writers_and_readers_see_consistent_worlds() {
        let world = Arc::new(SynchronizedWorld::default());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let world = Arc::clone(&world);
                thread::spawn(move || {
                    for i in 0..8 {
                        world.with_write(|w| {
                            let cf = GlobalCFrame::from_position(Position::new(f64::from(t * 10 + i), 0.0, 0.0));
                            let part = w.create_part(Shape::cuboid(1.0, 1.0, 1.0), cf, PartProperties::default());
                            assert!(w.add_part(part));
                        });
                    }
                })
            })
            .collect();
        let reader = {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                for _ in 0..16 {
                    world.with_read(|w| w.validate().unwrap());
                }
            })
        };
        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();
        let world = Arc::try_unwrap(world).unwrap().into_inner();
        assert_eq!(world.iter_parts(PartsFilter::Free).count(), 32);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let world = Arc::new(SynchronizedWorld::default());
        let clone = Arc::clone(&world);
        let result = thread::spawn(move || {
            let _guard = clone.write();
            panic!("writer died");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(world.read().layer_count(), 1);
    }
}
