//! Optional background generation worker.
//!
//! One thread, one request channel. The worker computes zone plans only;
//! plans are plain data, so the expensive part runs off-thread while entity
//! creation and zone mutation stay with the caller. Requests are served in
//! order by a single worker, which keeps generation single-writer.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use log::{debug, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::GenResult;
use crate::generator::{plan_zone, Neighbours, ZonePlan};
use crate::theme::{RegionTheme, ZoneTheme};

struct Request {
    token: u64,
    theme: ZoneTheme,
    region: Option<RegionTheme>,
    neighbours: Neighbours,
    seed: u64,
}

/// Handle to the worker thread. Dropping it shuts the thread down.
pub struct GenWorker {
    requests: Sender<Request>,
    results: Receiver<(u64, GenResult<ZonePlan>)>,
    handle: Option<JoinHandle<()>>,
}

impl GenWorker {
    pub fn spawn() -> GenWorker {
        let (req_tx, req_rx) = channel::<Request>();
        let (res_tx, res_rx) = channel();

        let handle = std::thread::spawn(move || {
            while let Ok(request) = req_rx.recv() {
                let mut rng = ChaCha8Rng::seed_from_u64(request.seed);
                let plan = plan_zone(
                    &request.theme,
                    request.region.as_ref(),
                    &request.neighbours,
                    &mut rng,
                );
                if res_tx.send((request.token, plan)).is_err() {
                    break;
                }
            }
            debug!("generation worker shutting down");
        });

        GenWorker {
            requests: req_tx,
            results: res_rx,
            handle: Some(handle),
        }
    }

    /// Queue one zone for planning. The token comes back with the result.
    pub fn request(
        &self,
        token: u64,
        theme: ZoneTheme,
        region: Option<RegionTheme>,
        neighbours: Neighbours,
        seed: u64,
    ) {
        let sent = self.requests.send(Request {
            token,
            theme,
            region,
            neighbours,
            seed,
        });
        if sent.is_err() {
            warn!("generation worker is gone; request {token} dropped");
        }
    }

    /// Take one finished plan if any is ready.
    pub fn poll(&self) -> Option<(u64, GenResult<ZonePlan>)> {
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the next finished plan.
    pub fn wait(&self) -> Option<(u64, GenResult<ZonePlan>)> {
        self.results.recv().ok()
    }
}

impl Drop for GenWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        let (dead_tx, _) = channel();
        self.requests = dead_tx;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::SpawnTable;

    fn theme() -> ZoneTheme {
        ZoneTheme {
            name: "warren".into(),
            algorithm: "cave".into(),
            min_size: 24,
            max_size: 24,
            floor: "dirt".into(),
            walls: "rock".into(),
            door: "wood_door".into(),
            randomness: 50,
            sparse: 0,
            remove: 0,
            cave_open: 20,
            cave_passes: 4,
            cave_threshold: 4,
            creatures: SpawnTable::default(),
            items: SpawnTable::default(),
            creature_density: 0,
            item_density: 0,
            features: Vec::new(),
            vegetation: Vec::new(),
            swim_terrain: Vec::new(),
        }
    }

    #[test]
    fn worker_matches_inline_planning() {
        let worker = GenWorker::spawn();
        worker.request(1, theme(), None, Neighbours::default(), 42);

        let (token, from_worker) = worker.wait().expect("worker delivered");
        assert_eq!(token, 1);
        let from_worker = from_worker.unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let inline = plan_zone(&theme(), None, &Neighbours::default(), &mut rng).unwrap();
        assert_eq!(from_worker.regions, inline.regions);
        assert_eq!(from_worker.entries, inline.entries);
    }

    #[test]
    fn requests_come_back_in_order() {
        let worker = GenWorker::spawn();
        for token in 0..4u64 {
            worker.request(token, theme(), None, Neighbours::default(), token);
        }
        for expected in 0..4u64 {
            let (token, plan) = worker.wait().expect("worker delivered");
            assert_eq!(token, expected);
            assert!(plan.is_ok());
        }
        assert!(worker.poll().is_none());
    }

    #[test]
    fn config_errors_travel_back() {
        let mut bad = theme();
        bad.algorithm = "voronoi".into();
        let worker = GenWorker::spawn();
        worker.request(9, bad, None, Neighbours::default(), 1);
        let (_, result) = worker.wait().expect("worker delivered");
        assert!(result.is_err());
    }
}
