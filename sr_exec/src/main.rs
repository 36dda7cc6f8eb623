//! Sample-return replay executable entry point.
//!
//! # Architecture
//!
//! The executable replays a JSON-lines telemetry log, one record per control cycle:
//!
//!     - Initialise the session, logger, parameters and modules
//!     - Main loop, for each telemetry record:
//!         - Telemetry decoding, dropping the cycle if any field is malformed
//!         - Mission bookkeeping
//!         - Perception processing, which also updates the world map
//!         - Navigation processing
//!         - Map reporting and archiving
//!     - Save the final world map and telemetry into the session
//!
//! # Modules
//!
//! All cyclic modules (`per`, `nav`) shall provide a public struct implementing the
//! `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::{
    actuation::NavCmd,
    telemetry::{Telemetry, TelemetryRecord},
};
use sr_lib::{
    data_store::DataStore,
    map::{report, GroundTruth, MapReport, SharedWorldMap, WorldMap, WorldMapParams},
    nav::{NavCtrl, NavInput, NavParams, NavTelem},
    params::ExecParams,
    per::{PerInput, PerMgr, PerMgrParams, Pose},
    tm::RoverTm,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::Utc;
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use std::convert::TryFrom;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};

// Internal
use util::{
    archive::Archiver,
    host,
    logger::{level_from_str, logger_init},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Exec params are needed before the session exists, so a missing exec.toml isn't logged.
    let exec_params: ExecParams =
        util::params::load_or_default("exec.toml").wrap_err("Could not load exec params")?;

    // Initialise session
    let session = Session::new("sr_exec", &exec_params.sessions_dir)
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(
        level_from_str(&exec_params.log_level),
        &exec_params.module_levels(),
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Sample-Return Replay Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let per_params: PerMgrParams =
        util::params::load_or_default("per.toml").wrap_err("Could not load perception params")?;
    let nav_params: NavParams =
        util::params::load_or_default("nav.toml").wrap_err("Could not load navigation params")?;
    let map_params: WorldMapParams =
        util::params::load_or_default("map.toml").wrap_err("Could not load map params")?;

    info!("Exec parameters loaded");

    // ---- GET TELEMETRY LOG ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected exactly one argument (the telemetry log path), found {}",
            args.len().saturating_sub(1)
        ));
    }

    info!("Replaying telemetry from \"{}\"", &args[1]);

    let tm_log = BufReader::new(
        File::open(&args[1]).wrap_err_with(|| format!("Could not open \"{}\"", &args[1]))?,
    );

    // ---- LOAD GROUND TRUTH ----

    let ground_truth = match exec_params.ground_truth_path {
        Some(ref path) => {
            let full_path = host::get_sw_root()
                .wrap_err("Could not find the software root")?
                .join(path);

            let truth = GroundTruth::load(&full_path)
                .wrap_err_with(|| format!("Could not load the ground truth from {:?}", full_path))?;

            info!("Ground truth loaded from {:?}", full_path);
            Some(truth)
        }
        None => {
            info!("No ground truth map configured, map fidelity will not be reported");
            None
        }
    };

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    let world_map = SharedWorldMap::new(WorldMap::new(map_params));

    let mut per_mgr =
        PerMgr::init((per_params, world_map.clone())).wrap_err("Failed to initialise PerMgr")?;
    info!("PerMgr init complete");

    let mut nav_ctrl = NavCtrl::init(nav_params).wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    let mut tm_arch =
        Archiver::from_path(&session, "rover_tm.csv").wrap_err("Failed to create TM archive")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    for (line_num, line) in tm_log.lines().enumerate() {
        let line = line.wrap_err("Could not read from the telemetry log")?;

        // Skip blank lines, usually at the end of the file
        if line.trim().is_empty() {
            continue;
        }

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(exec_params.status_log_period);

        // ---- DATA INPUT ----

        let tm = match serde_json::from_str::<TelemetryRecord>(&line) {
            Ok(record) => match Telemetry::try_from(record) {
                Ok(tm) => tm,
                Err(e) => {
                    warn!("Dropping cycle, bad telemetry on line {}: {}", line_num + 1, e);
                    ds.drop_cycle();
                    continue;
                }
            },
            Err(e) => {
                warn!("Dropping cycle, cannot parse line {}: {}", line_num + 1, e);
                ds.drop_cycle();
                continue;
            }
        };

        ds.mission.update(&tm, Utc::now());

        let pose = Pose::from(&tm);
        ds.pose = Some(pose);
        ds.nav_telem = NavTelem::from(&tm);

        // ---- PERCEPTION PROCESSING ----

        let per_input = PerInput {
            frame: tm.image,
            pose,
            mode: nav_ctrl.state().mode,
        };

        match per_mgr.proc(&per_input) {
            Ok((snapshot, rpt)) => {
                ds.per_snapshot = Some(snapshot);
                ds.per_status_rpt = rpt;
            }
            Err(e) => {
                warn!("Dropping cycle, perception failed: {}", e);
                ds.drop_cycle();
                continue;
            }
        }

        // ---- NAVIGATION PROCESSING ----

        let nav_input = NavInput {
            snapshot: ds.per_snapshot.clone(),
            telem: ds.nav_telem,
        };

        match nav_ctrl.proc(&nav_input) {
            Ok((cmd, rpt)) => {
                ds.nav_cmd = cmd;
                ds.nav_status_rpt = Some(rpt);
            }
            Err(e) => {
                error!("Error during NavCtrl processing, sending safe command: {}", e);
                ds.nav_cmd = NavCmd::safe(nav_ctrl.params.brake_set);
            }
        }

        // ---- REPORTING ----

        let samples_pos = &ds.mission.samples_pos;
        let map_report = world_map
            .read(|map| match ground_truth {
                Some(ref truth) => MapReport::new(map, truth, samples_pos).map(Some),
                None => Ok(None),
            })
            .and_then(|r| r);

        match map_report {
            Ok(r) => ds.map_report = r,
            Err(e) => warn!("Could not create the map report: {}", e),
        }

        ds.mission.samples_located = match ds.map_report {
            Some(ref r) => r.samples_located,
            None => world_map
                .read(|map| report::samples_located(map, samples_pos))
                .unwrap_or(ds.mission.samples_located),
        };

        // ---- ARCHIVING ----

        let rover_tm = RoverTm::new(&ds);

        if ds.is_status_cycle {
            info!("{}", rover_tm);
        }

        if let Err(e) = tm_arch.serialise(&rover_tm) {
            warn!("Could not archive the rover TM: {}", e);
        }
    }

    info!(
        "End of telemetry log reached after {} cycles ({} dropped)\n",
        ds.num_cycles, ds.num_dropped_cycles
    );

    // ---- SAVE RESULTS ----

    let final_tm = RoverTm::new(&ds);
    info!("Final status: {}", final_tm);
    session.save("final_tm.json", final_tm);

    let map = world_map
        .snapshot()
        .wrap_err("Could not take a snapshot of the world map")?;

    let map_img = map
        .to_image(ground_truth.as_ref(), &ds.mission.samples_pos)
        .wrap_err("Could not render the world map")?;
    session.save_image("world_map.png", map_img);
    session.save("world_map.json", map);

    if let Some(classified) = per_mgr.last_classified() {
        session.save_image("vision.png", classified.to_vision_image());
    }

    info!("Results saved in {:?}", session.session_root);

    session.exit();

    Ok(())
}
