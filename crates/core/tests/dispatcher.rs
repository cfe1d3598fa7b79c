//! Concurrency behaviour of `Driver::execute`: queueing, the queue-exempt
//! command, and cancellation by unexpected shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Notify;
use wd::{Automation, Driver, DriverOptions, EXECUTE_DRIVER_SCRIPT, Error, ListenerKind};

struct Plain;
impl Automation for Plain {}

struct Unqueued;
impl Automation for Unqueued {
	fn commands_queue_enabled(&self) -> bool {
		false
	}
}

#[derive(Default)]
struct Occupancy {
	current: AtomicUsize,
	max: AtomicUsize,
}

impl Occupancy {
	fn enter(&self) {
		let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
		self.max.fetch_max(now, Ordering::SeqCst);
	}

	fn leave(&self) {
		self.current.fetch_sub(1, Ordering::SeqCst);
	}
}

fn opts() -> DriverOptions {
	DriverOptions {
		idle_timeout_ms: 0,
		..DriverOptions::default()
	}
}

async fn with_session(driver: &Driver) {
	driver
		.execute("createSession", vec![json!({"platformName": "Android"})])
		.await
		.unwrap();
}

fn occupancy_driver<A: Automation>(automation: A, occupancy: Arc<Occupancy>) -> Driver {
	Driver::builder(automation)
		.options(opts())
		.command("slow", move |_driver, _args| {
			let occupancy = Arc::clone(&occupancy);
			async move {
				occupancy.enter();
				tokio::time::sleep(Duration::from_millis(20)).await;
				occupancy.leave();
				Ok(Value::Null)
			}
		})
		.unwrap()
		.build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn guarded_commands_never_overlap() {
	let occupancy = Arc::new(Occupancy::default());
	let driver = occupancy_driver(Plain, Arc::clone(&occupancy));
	with_session(&driver).await;

	let calls: Vec<_> = (0..8)
		.map(|_| {
			let driver = driver.clone();
			tokio::spawn(async move { driver.execute("slow", vec![]).await })
		})
		.collect();
	for call in calls {
		call.await.unwrap().unwrap();
	}

	assert_eq!(occupancy.max.load(Ordering::SeqCst), 1);
	assert_eq!(driver.event_history().commands.len(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disabled_queue_allows_overlap() {
	let occupancy = Arc::new(Occupancy::default());
	let driver = occupancy_driver(Unqueued, Arc::clone(&occupancy));
	with_session(&driver).await;

	let calls: Vec<_> = (0..4)
		.map(|_| {
			let driver = driver.clone();
			tokio::spawn(async move { driver.execute("slow", vec![]).await })
		})
		.collect();
	for call in calls {
		call.await.unwrap().unwrap();
	}

	assert!(occupancy.max.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn driver_script_runs_while_guarded_command_is_in_flight() {
	let release = Arc::new(Notify::new());
	let started = Arc::new(Notify::new());

	let (gate, signal) = (Arc::clone(&release), Arc::clone(&started));
	let driver = Driver::builder(Plain)
		.options(opts())
		.command("blocking", move |_driver, _args| {
			let (gate, signal) = (Arc::clone(&gate), Arc::clone(&signal));
			async move {
				signal.notify_one();
				gate.notified().await;
				Ok(json!("released"))
			}
		})
		.unwrap()
		.command(EXECUTE_DRIVER_SCRIPT, |_driver, _args| async { Ok(json!("script ran")) })
		.unwrap()
		.build();
	with_session(&driver).await;

	let blocked = {
		let driver = driver.clone();
		tokio::spawn(async move { driver.execute("blocking", vec![]).await })
	};
	started.notified().await;

	let script = tokio::time::timeout(Duration::from_secs(5), driver.execute(EXECUTE_DRIVER_SCRIPT, vec![]))
		.await
		.expect("exempt command waited for the queue")
		.unwrap();
	assert_eq!(script, json!("script ran"));

	// a guarded command has to wait
	let queued = {
		let driver = driver.clone();
		tokio::spawn(async move { driver.execute("getSession", vec![]).await })
	};
	tokio::task::yield_now().await;
	assert!(!queued.is_finished());

	release.notify_one();
	assert_eq!(blocked.await.unwrap().unwrap(), json!("released"));
	queued.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_cancels_in_flight_command() {
	let started = Arc::new(Notify::new());
	let signal = Arc::clone(&started);
	let driver = Driver::builder(Plain)
		.options(opts())
		.command("hang", move |_driver, _args| {
			let signal = Arc::clone(&signal);
			async move {
				signal.notify_one();
				std::future::pending::<()>().await;
				Ok(Value::Null)
			}
		})
		.unwrap()
		.build();
	with_session(&driver).await;

	let hung = {
		let driver = driver.clone();
		tokio::spawn(async move { driver.execute("hang", vec![]).await })
	};
	started.notified().await;

	let cause = Error::Unknown("device went away".into());
	driver.start_unexpected_shutdown(cause.clone()).await.unwrap();

	assert_eq!(hung.await.unwrap().unwrap_err(), cause);
	assert!(!driver.has_session());
	assert_eq!(driver.shutdown_signal().listener_count(ListenerKind::InFlight), 0);

	let err = driver.execute("getSession", vec![]).await.unwrap_err();
	assert!(err.is_no_such_driver());
}

#[tokio::test]
async fn shutdown_releases_commands_waiting_in_queue() {
	let started = Arc::new(Notify::new());
	let touched = Arc::new(AtomicBool::new(false));
	let (signal, flag) = (Arc::clone(&started), Arc::clone(&touched));
	let driver = Driver::builder(Plain)
		.options(opts())
		.command("hold", move |_driver, _args| {
			let signal = Arc::clone(&signal);
			async move {
				signal.notify_one();
				std::future::pending::<()>().await;
				Ok(Value::Null)
			}
		})
		.unwrap()
		.command("touch", move |_driver, _args| {
			let flag = Arc::clone(&flag);
			async move {
				flag.store(true, Ordering::SeqCst);
				Ok(Value::Null)
			}
		})
		.unwrap()
		.build();
	with_session(&driver).await;

	let held = {
		let driver = driver.clone();
		tokio::spawn(async move { driver.execute("hold", vec![]).await })
	};
	started.notified().await;
	let waiting = {
		let driver = driver.clone();
		tokio::spawn(async move { driver.execute("touch", vec![]).await })
	};
	for _ in 0..4 {
		tokio::task::yield_now().await;
	}
	assert!(!waiting.is_finished());

	driver.start_unexpected_shutdown(Error::unexpected_shutdown()).await.unwrap();

	assert_eq!(held.await.unwrap().unwrap_err(), Error::unexpected_shutdown());
	assert!(waiting.await.unwrap().unwrap_err().is_no_such_driver());
	assert!(!touched.load(Ordering::SeqCst));
	assert!(!driver.has_session());
	assert_eq!(driver.shutdown_signal().listener_count(ListenerKind::InFlight), 0);
}

#[tokio::test(start_paused = true)]
async fn idle_timer_stays_off_while_any_command_is_in_flight() {
	let started = Arc::new(Notify::new());
	let release = Arc::new(Notify::new());
	let (signal, gate) = (Arc::clone(&started), Arc::clone(&release));
	let driver = Driver::builder(Plain)
		.options(DriverOptions {
			idle_timeout_ms: 1_000,
			..DriverOptions::default()
		})
		.command("hold", move |_driver, _args| {
			let (signal, gate) = (Arc::clone(&signal), Arc::clone(&gate));
			async move {
				signal.notify_one();
				gate.notified().await;
				Ok(Value::Null)
			}
		})
		.unwrap()
		.command(EXECUTE_DRIVER_SCRIPT, |_driver, _args| async { Ok(Value::Null) })
		.unwrap()
		.build();
	with_session(&driver).await;
	assert!(driver.timeouts().idle_timer_active());

	let held = {
		let driver = driver.clone();
		tokio::spawn(async move { driver.execute("hold", vec![]).await })
	};
	started.notified().await;
	assert!(!driver.timeouts().idle_timer_active());

	driver.execute(EXECUTE_DRIVER_SCRIPT, vec![]).await.unwrap();
	assert!(!driver.timeouts().idle_timer_active());

	tokio::time::sleep(Duration::from_millis(2_500)).await;
	assert!(driver.has_session());

	release.notify_one();
	held.await.unwrap().unwrap();
	assert!(driver.timeouts().idle_timer_active());
}

#[tokio::test]
async fn commands_are_refused_while_shutting_down() {
	let entered = Arc::new(Notify::new());
	let leave = Arc::new(Notify::new());
	let (signal, gate) = (Arc::clone(&entered), Arc::clone(&leave));

	struct SlowDelete {
		entered: Arc<Notify>,
		leave: Arc<Notify>,
	}
	impl Automation for SlowDelete {
		fn on_delete_session<'a>(&'a self, _driver: &'a Driver) -> wd::BoxFuture<'a, wd::Result<()>> {
			Box::pin(async move {
				self.entered.notify_one();
				self.leave.notified().await;
				Ok(())
			})
		}
	}

	let driver = Driver::builder(SlowDelete {
		entered: signal,
		leave: gate,
	})
	.options(opts())
	.build();
	with_session(&driver).await;

	let shutdown = {
		let driver = driver.clone();
		tokio::spawn(async move { driver.start_unexpected_shutdown(Error::unexpected_shutdown()).await })
	};
	entered.notified().await;

	assert!(driver.shutdown_signal().is_shutting_down());
	let err = driver.execute("getStatus", vec![]).await.unwrap_err();
	assert_eq!(err, Error::unexpected_shutdown());

	leave.notify_one();
	shutdown.await.unwrap().unwrap();
	assert!(!driver.shutdown_signal().is_shutting_down());
	driver.execute("getStatus", vec![]).await.unwrap();
}

#[tokio::test]
async fn handler_panic_surfaces_as_unknown_error() {
	let driver = Driver::builder(Plain)
		.options(opts())
		.command("explode", |_driver, _args| async {
			if true {
				panic!("handler bug");
			}
			Ok(Value::Null)
		})
		.unwrap()
		.build();
	with_session(&driver).await;

	let err = driver.execute("explode", vec![]).await.unwrap_err();
	assert!(matches!(err, Error::Unknown(_)));
	driver.execute("getSession", vec![]).await.unwrap();
}
