use crate::config::CoreConfig;
use crate::dispatch::{
    DispatchError, Dispatcher, DispatcherHandle, DispatcherSettings, Scheduler, SchedulerHandle,
    TaskId,
};
use crate::telemetry::logging;
use crate::world::state::WorldState;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GameState {
    Startup = 0,
    Normal = 1,
    Shutdown = 2,
}

impl GameState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => GameState::Startup,
            1 => GameState::Normal,
            _ => GameState::Shutdown,
        }
    }
}

/// Owns the dispatcher thread (and through it the world) and the scheduler
/// thread. Collaborators reach the world only by posting tasks here.
pub struct Game {
    dispatcher: Dispatcher<WorldState>,
    scheduler: Scheduler<WorldState>,
    state: AtomicU8,
}

impl Game {
    pub fn start(world: WorldState, config: &CoreConfig) -> Result<Self, DispatchError> {
        let game = Self::launch(world, DispatcherSettings::from(config))?;
        game.set_state(GameState::Normal);
        logging::log_game("game started");
        Ok(game)
    }

    fn launch(world: WorldState, settings: DispatcherSettings) -> Result<Self, DispatchError> {
        let dispatcher = Dispatcher::start(world, settings)?;
        let scheduler = Scheduler::start(dispatcher.handle())?;
        let handle = scheduler.handle();
        dispatcher
            .handle()
            .post(move |world: &mut WorldState| world.attach_scheduler(handle))?;
        Ok(Self {
            dispatcher,
            scheduler,
            state: AtomicU8::new(GameState::Startup as u8),
        })
    }

    pub fn state(&self) -> GameState {
        GameState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: GameState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn dispatcher(&self) -> DispatcherHandle<WorldState> {
        self.dispatcher.handle()
    }

    pub fn scheduler(&self) -> SchedulerHandle<WorldState> {
        self.scheduler.handle()
    }

    pub fn post(
        &self,
        func: impl FnOnce(&mut WorldState) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.dispatcher.handle().post(func)
    }

    pub fn schedule(
        &self,
        delay: Duration,
        func: impl FnOnce(&mut WorldState) + Send + 'static,
    ) -> Result<TaskId, DispatchError> {
        self.scheduler.handle().schedule(delay, func)
    }

    pub fn cancel(&self, id: TaskId) -> bool {
        self.scheduler.handle().cancel(id)
    }

    pub fn cycle(&self) -> u64 {
        self.dispatcher.handle().cycle()
    }

    /// Stops the scheduler, lets the dispatcher finish its queue and returns
    /// the world it owned.
    pub fn shutdown(self) -> Result<WorldState, DispatchError> {
        self.set_state(GameState::Shutdown);
        let Game {
            dispatcher,
            scheduler,
            ..
        } = self;
        scheduler.wait_until_stopped()?;
        dispatcher.handle().post(|world: &mut WorldState| {
            world.detach_scheduler();
        })?;
        let world = dispatcher.join()?;
        logging::log_game("game stopped");
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::cylinder::CylinderId;
    use crate::world::position::Position;
    use crate::world::testing::{fixture, types};
    use std::sync::mpsc;

    #[test]
    fn lifecycle_returns_the_world_without_a_scheduler() {
        let game = Game::start(fixture(), &CoreConfig::default()).expect("game");
        assert_eq!(game.state(), GameState::Normal);
        let (tx, rx) = mpsc::channel();
        game.post(move |world| {
            tx.send(world.scheduler().is_some()).expect("send");
        })
        .expect("posted");
        assert!(rx.recv_timeout(Duration::from_secs(5)).expect("answer"));

        let world = game.shutdown().expect("shutdown");
        assert!(world.scheduler().is_none());
        assert_eq!(world.map.tile_count(), 400);
    }

    #[test]
    fn decay_runs_through_the_scheduler() {
        let game = Game::start(fixture(), &CoreConfig::default()).expect("game");
        let at = Position::new(6, 6, 7);
        let (tx, rx) = mpsc::channel();
        game.post(move |world| {
            let torch = world.place_item(at, types::TORCH);
            tx.send((torch, world.start_decaying(torch))).expect("send");
        })
        .expect("posted");
        let (torch, started) = rx.recv_timeout(Duration::from_secs(5)).expect("placed");
        assert!(started);

        std::thread::sleep(Duration::from_millis(300));
        let (tx, rx) = mpsc::channel();
        game.post(move |world| {
            let entry = world.item(torch).map(|item| (item.type_id(), item.parent));
            tx.send(entry).expect("send");
        })
        .expect("posted");
        let entry = rx.recv_timeout(Duration::from_secs(5)).expect("inspected");
        assert_eq!(entry, Some((types::BURNT_TORCH, Some(CylinderId::Tile(at)))));
        game.shutdown().expect("shutdown");
    }

    #[test]
    fn scheduled_world_tasks_can_be_cancelled() {
        let game = Game::start(fixture(), &CoreConfig::default()).expect("game");
        let (tx, rx) = mpsc::channel::<u64>();
        let id = game
            .schedule(Duration::from_millis(200), move |_| {
                tx.send(1).expect("send");
            })
            .expect("scheduled");
        assert!(game.cancel(id));
        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());

        let (done_tx, done_rx) = mpsc::channel();
        game.post(move |_| done_tx.send(()).expect("send"))
            .expect("posted");
        done_rx.recv_timeout(Duration::from_secs(5)).expect("round trip");
        assert!(game.cycle() >= 1);
        game.shutdown().expect("shutdown");
    }
}
