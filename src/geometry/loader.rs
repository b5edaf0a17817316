//! Loads nTop CSV exports from a folder into [`GeometryData`].
//!
//! Input units are inches, lbm and lbm·in²; output is feet and lbm·ft².
//! Column lookup for `mass.csv` is an ordered list of resolution strategies per
//! field, evaluated by [`resolve_field`].

use std::fs;
use std::path::Path;

use crate::context::RunContext;
use crate::error::LoadError;
use crate::geometry::{GeometryData, MassProperties, PanelPointSet, Point3};
use crate::units;

pub const MASS_FILE: &str = "mass.csv";
pub const LE_FILE: &str = "LEpts.csv";
pub const TE_FILE: &str = "TEpts.csv";
pub const WINGLET_FILE: &str = "WINGLETpts.csv";
pub const CONTROL_FILE: &str = "ELEVONpts.csv";

/// One way of finding a field value in a CSV row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolve {
    Column(&'static str),
    Position(usize),
    Fallback(f64),
}

use Resolve::{Column, Fallback, Position};

/// Mass, CG, then the six inertia components.
pub const MASS_FIELDS: [(&str, &[Resolve]); 10] = [
    ("mass", &[Column("avl_mass"), Column("mass"), Position(0)]),
    ("cg_x", &[Column("avl_CGx"), Column("cg_x"), Column("x"), Position(1)]),
    ("cg_y", &[Column("avl_CGy"), Column("cg_y"), Column("y"), Position(2)]),
    ("cg_z", &[Column("avl_CGz"), Column("cg_z"), Column("z"), Position(3)]),
    ("Ixx", &[Column("avl_Ixx"), Column("Ixx"), Position(4)]),
    ("Iyy", &[Column("avl_Iyy"), Column("Iyy"), Position(5)]),
    ("Izz", &[Column("avl_Izz"), Column("Izz"), Position(6)]),
    ("Ixy", &[Column("avl_Ixy"), Column("Ixy"), Position(7), Fallback(0.0)]),
    ("Iyz", &[Column("avl_Iyz"), Column("Iyz"), Position(8), Fallback(0.0)]),
    ("Ixz", &[Column("avl_Ixz"), Column("Ixz"), Position(9), Fallback(0.0)]),
];

/// First strategy that yields a number wins.
pub fn resolve_field(header: &[String], row: &[String], strategies: &[Resolve]) -> Option<f64> {
    strategies.iter().find_map(|s| match *s {
        Column(name) => header
            .iter()
            .position(|h| h == name)
            .and_then(|i| row.get(i))
            .and_then(|v| v.parse().ok()),
        Position(i) => row.get(i).and_then(|v| v.parse().ok()),
        Fallback(v) => Some(v),
    })
}

struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .collect()
}

fn parse_table(text: &str) -> Table {
    let mut lines = text
        .lines()
        .map(|l| l.trim_start_matches('\u{feff}'))
        .filter(|l| !l.trim().is_empty());
    let header = lines.next().map(split_row).unwrap_or_default();
    let rows = lines.map(split_row).collect();
    Table { header, rows }
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse `mass.csv` text (one data row). Result is in feet / lbm·ft².
pub fn parse_mass(text: &str, file: &str) -> Result<MassProperties, LoadError> {
    let table = parse_table(text);
    if table.rows.len() != 1 {
        return Err(LoadError::Format {
            file: file.to_string(),
            message: format!("expected 1 data row, got {}", table.rows.len()),
        });
    }
    let row = &table.rows[0];

    let mut values = [0.0; 10];
    for (slot, (name, strategies)) in values.iter_mut().zip(MASS_FIELDS.iter()) {
        *slot = resolve_field(&table.header, row, strategies).ok_or_else(|| LoadError::Format {
            file: file.to_string(),
            message: format!("could not resolve field {}", name),
        })?;
    }
    let [mass, cx, cy, cz, ixx, iyy, izz, ixy, iyz, ixz] = values;

    let cg = units::point_to_feet(Point3::new(cx, cy, cz));
    let m = MassProperties::from_components(mass, cg, [ixx, iyy, izz, ixy, ixz, iyz]);
    Ok(MassProperties {
        inertia: units::inertia_to_ft2(m.inertia),
        ..m
    })
}

/// Parse a points CSV: `x,y,z` columns when present, otherwise the first three.
pub fn parse_points(text: &str, file: &str, label: &str) -> Result<PanelPointSet, LoadError> {
    let table = parse_table(text);
    if table.rows.is_empty() {
        return Err(LoadError::Format {
            file: file.to_string(),
            message: "empty CSV file".to_string(),
        });
    }

    let named: Option<Vec<usize>> = ["x", "y", "z"]
        .iter()
        .map(|c| table.header.iter().position(|h| h == c))
        .collect();
    let cols = match named {
        Some(c) => c,
        None if table.header.len() >= 3 => vec![0, 1, 2],
        None => {
            return Err(LoadError::Format {
                file: file.to_string(),
                message: "could not find x, y, z columns".to_string(),
            })
        }
    };

    let mut points = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let mut xyz = [0.0; 3];
        for (slot, &c) in xyz.iter_mut().zip(cols.iter()) {
            *slot = row
                .get(c)
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| LoadError::Format {
                    file: file.to_string(),
                    message: format!("row {}: non-numeric coordinate", i + 1),
                })?;
        }
        points.push(units::point_to_feet(Point3::new(xyz[0], xyz[1], xyz[2])));
    }
    Ok(PanelPointSet::new(label, points))
}

fn load_points(folder: &Path, name: &str, label: &str) -> Result<PanelPointSet, LoadError> {
    let path = folder.join(name);
    parse_points(&read(&path)?, &file_name(&path), label)
}

/// Load every export in `folder`. The three required files must exist.
pub fn load_panel_data(folder: &Path, ctx: &RunContext) -> Result<GeometryData, LoadError> {
    if !folder.is_dir() {
        return Err(LoadError::MissingDirectory(folder.display().to_string()));
    }
    ctx.info(format!("loading geometry from {}", folder.display()));

    let missing: Vec<String> = [MASS_FILE, LE_FILE, TE_FILE]
        .iter()
        .filter(|f| !folder.join(f).exists())
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingFiles(missing));
    }

    let mass_path = folder.join(MASS_FILE);
    let mass = parse_mass(&read(&mass_path)?, MASS_FILE)?;
    ctx.ok(format!("{} (mass={:.3} lbm)", MASS_FILE, mass.mass));

    let leading_edge = load_points(folder, LE_FILE, "Leading Edge")?;
    ctx.ok(format!("{} ({} points)", LE_FILE, leading_edge.len()));
    let trailing_edge = load_points(folder, TE_FILE, "Trailing Edge")?;
    ctx.ok(format!("{} ({} points)", TE_FILE, trailing_edge.len()));

    let winglet = if folder.join(WINGLET_FILE).exists() {
        let p = load_points(folder, WINGLET_FILE, "Winglet")?;
        ctx.ok(format!("{} ({} points)", WINGLET_FILE, p.len()));
        Some(p)
    } else {
        None
    };
    let control_panel = if folder.join(CONTROL_FILE).exists() {
        let p = load_points(folder, CONTROL_FILE, "Elevon")?;
        ctx.ok(format!("{} ({} points)", CONTROL_FILE, p.len()));
        Some(p)
    } else {
        None
    };

    Ok(GeometryData {
        mass,
        leading_edge,
        trailing_edge,
        winglet,
        control_panel,
    })
}
