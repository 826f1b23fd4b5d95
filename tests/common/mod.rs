#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use factory_dashboard::data::{parse_table, RawTable};

pub const HEADER: &str = "Drill_Pressure;Drilling_Surf_Quality;Drilling_Speed;Milling_Gear_Depth;Milling_Circle_Diameter;Turning_Cut_Speed;Turning_Cut_Depth;class";

/// Small line sample: row 1 misses Drill_Pressure, row 3 misses two sensors.
pub const ROWS: &[&str] = &[
    "120.5;0.81;3100;2.4;40.1;210;1.10;OK",
    ";0.79;3050;2.5;40.3;205;1.12;NOK",
    "118.0;0.83;3120;2.3;40.0;212;1.09;OK",
    "121.5;;3090;2.6;;208;1.15;NOK",
    "119.0;0.80;3110;2.4;40.2;209;1.11;OK",
];

pub fn csv_text(rows: &[&str]) -> String {
    let mut out = HEADER.to_string();
    for r in rows {
        out.push('\n');
        out.push_str(r);
    }
    out.push('\n');
    out
}

pub fn raw_table() -> RawTable {
    parse_table(&csv_text(ROWS), ';').unwrap().0
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 18, 9, 30, 0).unwrap()
}
