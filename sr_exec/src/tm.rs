//! # Defines the Rover Telemetry Summary
//!
//! [`RoverTm`] is a flat record of a single cycle, archived as CSV and logged periodically.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{data_store::DataStore, nav::NavMode};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoverTm {
    pub cycle: u64,
    pub total_time_s: f64,

    pub pos_x: Option<f64>,
    pub pos_y: Option<f64>,
    pub yaw_deg: Option<f64>,
    pub speed: f64,
    pub near_sample: bool,
    pub picking_up: bool,

    pub mode: Option<NavMode>,
    pub stuck_count: f64,
    pub stuck_in_stuck_count: f64,
    pub cut_out_count: u32,
    pub steer_cut_index: usize,

    pub throttle: f64,
    pub brake: f64,
    pub steer: f64,
    pub send_pickup: bool,

    pub num_navigable: usize,
    pub num_rock: usize,

    pub percent_mapped: Option<f64>,
    pub fidelity: Option<f64>,

    pub samples_located: usize,
    pub samples_collected: u32,
    pub samples_to_find: u32,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl RoverTm {
    pub fn new(ds: &DataStore) -> Self {
        let nav = ds.nav_status_rpt.as_ref();

        Self {
            cycle: ds.num_cycles,
            total_time_s: ds.mission.total_time_s,
            pos_x: ds.pose.map(|p| p.position.x),
            pos_y: ds.pose.map(|p| p.position.y),
            yaw_deg: ds.pose.map(|p| p.yaw_deg),
            speed: ds.nav_telem.speed,
            near_sample: ds.nav_telem.near_sample,
            picking_up: ds.nav_telem.picking_up,
            mode: nav.map(|n| n.mode),
            stuck_count: nav.map(|n| n.stuck_count).unwrap_or_default(),
            stuck_in_stuck_count: nav.map(|n| n.stuck_in_stuck_count).unwrap_or_default(),
            cut_out_count: nav.map(|n| n.cut_out_count).unwrap_or_default(),
            steer_cut_index: nav.map(|n| n.steer_cut_index).unwrap_or_default(),
            throttle: ds.nav_cmd.throttle,
            brake: ds.nav_cmd.brake,
            steer: ds.nav_cmd.steer,
            send_pickup: ds.nav_cmd.send_pickup,
            num_navigable: ds.per_status_rpt.num_navigable,
            num_rock: ds.per_status_rpt.num_rock,
            percent_mapped: ds.map_report.map(|r| r.percent_mapped),
            fidelity: ds.map_report.map(|r| r.fidelity),
            samples_located: ds.mission.samples_located,
            samples_collected: ds.mission.samples_collected,
            samples_to_find: ds.mission.samples_to_find,
        }
    }
}

impl Display for RoverTm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = self.mode.map(|m| m.name()).unwrap_or("none");
        let pct = |v: Option<f64>| match v {
            Some(v) => format!("{:.1} %", v),
            None => String::from("-"),
        };

        write!(
            f,
            "cycle {} ({:.2} s): mode = {}, speed = {:.2}, throttle = {:.2}, steer = {:.2}, \
             brake = {:.1}\n    stuck = {}, stuck in stuck = {}, cut out = {} (index {})\n    \
             mapped = {}, fidelity = {}, samples located = {}, collected = {} of {}",
            self.cycle,
            self.total_time_s,
            mode,
            self.speed,
            self.throttle,
            self.steer,
            self.brake,
            self.stuck_count,
            self.stuck_in_stuck_count,
            self.cut_out_count,
            self.steer_cut_index,
            pct(self.percent_mapped),
            pct(self.fidelity),
            self.samples_located,
            self.samples_collected,
            self.samples_to_find
        )
    }
}
