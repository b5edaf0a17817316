//! Panel-solver input deck (`.avl`) and mass file (`.mass`) writer.
//!
//! Deck order: header (name, Mach, symmetry, Sref/Cref/Bref, moment reference),
//! the main wing surface with its Y-sorted sections and per-section control
//! hinges, then an optional winglet surface.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{Paneling, Root};
use crate::context::RunContext;
use crate::geometry::{GeometryData, MassProperties, PanelPointSet, Point3};
use crate::hinge::{self, ControlOutline, HingeStatus, SectionHinge};
use crate::reference::ReferenceGeometry;

const WINGLET_NCHORDWISE: u32 = 8;
const WINGLET_NACA: &str = "0012";

fn rule(ch: char) -> String {
    format!("#{}", ch.to_string().repeat(70))
}

/// One spanwise station of a lifting surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WingSection {
    pub le: Point3,
    pub chord: f64,
}

/// Pair LE/TE points into sections sorted root to tip.
pub fn sorted_sections(le: &[Point3], te: &[Point3]) -> Vec<WingSection> {
    let mut out: Vec<WingSection> = le
        .iter()
        .zip(te)
        .map(|(a, b)| WingSection {
            le: *a,
            chord: (b - a).norm(),
        })
        .collect();
    out.sort_by(|a, b| a.le.y.total_cmp(&b.le.y));
    out
}

/// Spanwise panel count for a segment, keeping panel width near `target`.
pub fn spanwise_panels(segment: f64, target: f64, min: u32, max: u32) -> u32 {
    let n = (segment.abs() / target).round_ties_even();
    (n.max(0.0) as u32).clamp(min, max)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Airfoil {
    /// Absolute path with forward slashes
    File(String),
    Naca(String),
}

impl Airfoil {
    /// Use the coordinate file when it exists, otherwise the NACA code.
    pub fn resolve(file: Option<&str>, naca: &str) -> Self {
        if let Some(f) = file {
            let path = Path::new(f);
            if path.is_file() {
                let abs = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                return Airfoil::File(abs.to_string_lossy().replace('\\', "/"));
            }
        }
        Airfoil::Naca(naca.to_string())
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Airfoil::File(path) => writeln!(w, "AFILE\n{}\n", path),
            Airfoil::Naca(code) => writeln!(w, "NACA\n{}\n", code),
        }
    }
}

/// Files written for one aircraft.
#[derive(Debug, Clone)]
pub struct Deck {
    pub avl_path: PathBuf,
    pub mass_path: PathBuf,
    pub hinges: Vec<SectionHinge>,
}

#[derive(Debug, Clone)]
pub struct DeckWriter {
    pub paneling: Paneling,
    pub symmetric_name: String,
    pub differential_name: String,
    pub mach: f64,
    pub airfoil: Airfoil,
}

impl DeckWriter {
    pub fn from_config(cfg: &Root) -> Self {
        Self {
            airfoil: Airfoil::resolve(cfg.paneling.airfoil_file.as_deref(), &cfg.paneling.naca),
            paneling: cfg.paneling.clone(),
            symmetric_name: cfg.controls.symmetric_name.clone(),
            differential_name: cfg.controls.differential_name.clone(),
            mach: cfg.analysis.mach,
        }
    }

    /// Write `<name>.avl` and `<name>.mass` into `dir`.
    pub fn write_files(
        &self,
        dir: &Path,
        name: &str,
        geom: &GeometryData,
        reference: &ReferenceGeometry,
        ctx: &RunContext,
    ) -> Result<Deck> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create deck directory: {}", dir.display()))?;
        let avl_path = dir.join(format!("{}.avl", name));
        let mass_path = dir.join(format!("{}.mass", name));

        let mut buf = Vec::new();
        let hinges = self.write_avl(&mut buf, name, geom, reference)?;
        fs::write(&avl_path, &buf)
            .with_context(|| format!("failed to write {}", avl_path.display()))?;

        let mut buf = Vec::new();
        write_mass(&mut buf, &geom.mass)?;
        fs::write(&mass_path, &buf)
            .with_context(|| format!("failed to write {}", mass_path.display()))?;

        for h in hinges.iter().filter(|h| h.status == HingeStatus::Flagged) {
            ctx.warn(format!(
                "section at Y={:.3} ft: hinge fraction {:.3} outside chord, no control written",
                h.y, h.raw_fraction
            ));
        }
        for h in &hinges {
            ctx.debug(format!(
                "hinge Y={:.3} ft: x/c={:.4} ({:?})",
                h.y, h.hinge_fraction, h.status
            ));
        }
        ctx.ok(format!("deck: {}", avl_path.display()));
        ctx.ok(format!("mass: {}", mass_path.display()));

        Ok(Deck {
            avl_path,
            mass_path,
            hinges,
        })
    }

    /// Emit the deck; returns the hinge assignment used for the main wing.
    pub fn write_avl<W: Write>(
        &self,
        w: &mut W,
        name: &str,
        geom: &GeometryData,
        reference: &ReferenceGeometry,
    ) -> io::Result<Vec<SectionHinge>> {
        self.write_header(w, name, reference)?;
        let hinges = self.write_main_wing(w, geom)?;
        if let Some(winglet) = &geom.winglet {
            self.write_winglet(w, winglet)?;
        }
        Ok(hinges)
    }

    fn write_header<W: Write>(&self, w: &mut W, name: &str, r: &ReferenceGeometry) -> io::Result<()> {
        writeln!(w, "{}", name)?;
        writeln!(w, "{}", rule('='))?;
        writeln!(w, "# AVL input file generated from nTop geometry export")?;
        writeln!(w, "{}\n", rule('='))?;

        writeln!(w, "#Mach")?;
        writeln!(w, "{:.4}\n", self.mach)?;

        writeln!(w, "#IYsym   IZsym   Zsym")?;
        writeln!(w, "0       0       0.0\n")?;

        writeln!(w, "#Sref    Cref    Bref")?;
        writeln!(w, "{:.6}  {:.6}  {:.6}\n", r.area, r.chord, r.span)?;

        let [x, y, z] = r.moment_reference;
        writeln!(w, "#Xref    Yref    Zref")?;
        writeln!(w, "{:.6}  {:.6}  {:.6}\n", x, y, z)?;
        Ok(())
    }

    fn write_surface_header<W: Write>(w: &mut W, title: &str, nchord: u32) -> io::Result<()> {
        writeln!(w, "{}", rule('-'))?;
        writeln!(w, "SURFACE\n{}\n", title)?;
        writeln!(w, "#Nchordwise  Cspace  [Nspanwise  Sspace]")?;
        writeln!(w, "{}          1.0\n", nchord)?;
        writeln!(w, "YDUPLICATE\n0.0\n")?;
        Ok(())
    }

    fn write_section<W: Write>(w: &mut W, s: &WingSection, nspan: Option<u32>) -> io::Result<()> {
        writeln!(w, "{}", rule('-'))?;
        writeln!(w, "SECTION")?;
        writeln!(w, "#Xle    Yle     Zle     Chord   Ainc  [ Nspan  Sspace ]")?;
        match nspan {
            Some(n) => writeln!(
                w,
                "{:.6}  {:.6}  {:.6}  {:.6}  0.0  {}  1.0\n",
                s.le.x, s.le.y, s.le.z, s.chord, n
            ),
            None => writeln!(
                w,
                "{:.6}  {:.6}  {:.6}  {:.6}  0.0\n",
                s.le.x, s.le.y, s.le.z, s.chord
            ),
        }
    }

    fn write_controls<W: Write>(&self, w: &mut W, hinge_fraction: f64) -> io::Result<()> {
        writeln!(w, "CONTROL")?;
        writeln!(w, "#Cname   Cgain  Xhinge  XYZhvec  SgnDup")?;
        writeln!(
            w,
            "{:<8} 1.0    {:.4}    0. 0. 0.    1.0\n",
            self.symmetric_name, hinge_fraction
        )?;
        writeln!(w, "CONTROL")?;
        writeln!(w, "#Cname   Cgain  Xhinge  XYZhvec  SgnDup")?;
        writeln!(
            w,
            "{:<8} 1.0    {:.4}    0. 0. 0.   -1.0\n",
            self.differential_name, hinge_fraction
        )?;
        Ok(())
    }

    fn write_main_wing<W: Write>(&self, w: &mut W, geom: &GeometryData) -> io::Result<Vec<SectionHinge>> {
        Self::write_surface_header(w, "Main Wing", self.paneling.nchordwise)?;

        let sections = sorted_sections(&geom.leading_edge.points, &geom.trailing_edge.points);
        let hinges = geom
            .control_panel
            .as_ref()
            .and_then(ControlOutline::from_points)
            .map(|outline| hinge::assign(&outline, &sections))
            .unwrap_or_default();

        let p = &self.paneling;
        for (i, s) in sections.iter().enumerate() {
            let nspan = sections.get(i + 1).map(|next| {
                spanwise_panels(next.le.y - s.le.y, p.target_panel_width, p.min_nspan, p.max_nspan)
            });
            Self::write_section(w, s, nspan)?;
            self.airfoil.write(w)?;

            if let Some(h) = hinges.iter().find(|h| h.section == i && h.emits_control()) {
                self.write_controls(w, h.hinge_fraction)?;
            }
        }
        Ok(hinges)
    }

    fn write_winglet<W: Write>(&self, w: &mut W, winglet: &PanelPointSet) -> io::Result<()> {
        let sections = winglet_sections(winglet);
        if sections.len() < 2 {
            return Ok(());
        }
        Self::write_surface_header(w, "Winglet", WINGLET_NCHORDWISE)?;

        let p = &self.paneling;
        let naca = Airfoil::Naca(WINGLET_NACA.to_string());
        for (i, s) in sections.iter().enumerate() {
            let nspan = sections.get(i + 1).map(|next| {
                spanwise_panels(
                    next.le.z - s.le.z,
                    p.winglet_panel_height,
                    p.min_nspan,
                    p.winglet_max_nspan,
                )
            });
            Self::write_section(w, s, nspan)?;
            naca.write(w)?;
        }
        Ok(())
    }
}

/// Winglet stations: points grouped by Z (to 0.01 ft), bottom to top, LE the
/// forward-most point and TE the aft-most at each level.
pub fn winglet_sections(winglet: &PanelPointSet) -> Vec<WingSection> {
    let mut pts = winglet.points.clone();
    if pts.len() > 3 {
        if let (Some(a), Some(b)) = (pts.first(), pts.last()) {
            if (a - b).norm() < 1e-9 {
                pts.pop();
            }
        }
    }

    let mut levels: Vec<(i64, Vec<Point3>)> = Vec::new();
    for p in pts {
        let key = (p.z * 100.0).round() as i64;
        match levels.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(p),
            None => levels.push((key, vec![p])),
        }
    }
    levels.sort_by_key(|(k, _)| *k);

    levels
        .into_iter()
        .filter_map(|(_, group)| {
            let le = group.iter().min_by(|a, b| a.x.total_cmp(&b.x))?;
            let te = group.iter().max_by(|a, b| a.x.total_cmp(&b.x))?;
            Some(WingSection {
                le: *le,
                chord: (te - le).norm(),
            })
        })
        .collect()
}

/// Mass file in feet / lbm / lbm·ft², units declared in the file.
pub fn write_mass<W: Write>(w: &mut W, m: &MassProperties) -> io::Result<()> {
    let [ixx, iyy, izz, ixy, ixz, iyz] = m.inertia_components();
    writeln!(w, "#  AVL Mass File")?;
    writeln!(w, "#  Units: feet, lbm, lbm-ft^2")?;
    writeln!(w, "#")?;
    writeln!(w, "Lunit = 1.0 ft")?;
    writeln!(w, "Munit = 1.0 lbm")?;
    writeln!(w, "Tunit = 1.0 s")?;
    writeln!(w, "#")?;
    writeln!(
        w,
        "#  mass       x          y          z          Ixx        Iyy        Izz        Ixy        Ixz        Iyz"
    )?;
    writeln!(
        w,
        "{:10.4}  {:10.6}  {:10.6}  {:10.6}  {:10.4}  {:10.4}  {:10.4}  {:10.4}  {:10.4}  {:10.4}",
        m.mass, m.cg.x, m.cg.y, m.cg.z, ixx, iyy, izz, ixy, ixz, iyz
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferenceConfig;
    use crate::geometry::fixtures::rectangular_half_wing;
    use crate::reference;

    fn writer() -> DeckWriter {
        let mut cfg = Root::default();
        cfg.analysis.mach = 0.2;
        DeckWriter::from_config(&cfg)
    }

    fn render(geom: &GeometryData) -> (String, Vec<SectionHinge>) {
        let r = reference::compute(geom, &ReferenceConfig::default());
        let mut buf = Vec::new();
        let hinges = writer().write_avl(&mut buf, "wing", geom, &r).unwrap();
        (String::from_utf8(buf).unwrap(), hinges)
    }

    #[test]
    fn test_spanwise_panels_clamped() {
        assert_eq!(spanwise_panels(2.0, 0.4, 3, 40), 5);
        assert_eq!(spanwise_panels(0.1, 0.4, 3, 40), 3);
        assert_eq!(spanwise_panels(100.0, 0.4, 3, 40), 40);
        assert_eq!(spanwise_panels(-2.0, 0.4, 3, 40), 5);
    }

    #[test]
    fn test_header_and_sections() {
        let (text, hinges) = render(&rectangular_half_wing());
        assert!(hinges.is_empty());
        assert!(text.starts_with("wing\n"));
        assert!(text.contains("#Mach\n0.2000\n"));
        assert!(text.contains("8.000000  1.000000  8.000000\n"));
        assert!(text.contains("0.250000  0.000000  0.000000\n"));
        assert!(text.contains("YDUPLICATE\n0.0\n"));
        assert_eq!(text.matches("SECTION\n").count(), 3);
        // 2 ft segments at 0.4 ft panels; tip section carries no count
        assert!(text.contains("0.000000  0.000000  0.000000  1.000000  0.0  5  1.0\n"));
        assert!(text.contains("0.000000  4.000000  0.000000  1.000000  0.0\n"));
        assert!(text.contains("NACA\n0012\n"));
        assert!(!text.contains("CONTROL"));
    }

    #[test]
    fn test_controls_written_per_section() {
        let mut g = rectangular_half_wing();
        // Control LE at x = 0.75 from Y=2 to Y=4
        g.control_panel = Some(PanelPointSet::from_xyz(
            "Elevon",
            &[[0.75, 2.0, 0.0], [0.75, 4.0, 0.0], [1.0, 4.0, 0.0], [1.0, 2.0, 0.0]],
        ));
        let (text, hinges) = render(&g);
        assert_eq!(hinges.len(), 2);
        assert_eq!(text.matches("CONTROL\n").count(), 4);
        assert!(text.contains("elevon   1.0    0.7500    0. 0. 0.    1.0\n"));
        assert!(text.contains("aileron  1.0    0.7500    0. 0. 0.   -1.0\n"));
        // Root section has no control
        let root = text.split("SECTION\n").nth(1).unwrap();
        assert!(!root.contains("CONTROL"));
    }

    #[test]
    fn test_winglet_surface() {
        let mut g = rectangular_half_wing();
        g.winglet = Some(PanelPointSet::from_xyz(
            "Winglet",
            &[[0.0, 4.0, 0.0], [0.5, 4.0, 1.0], [0.9, 4.0, 1.0], [1.0, 4.0, 0.0]],
        ));
        let (text, _) = render(&g);
        assert!(text.contains("SURFACE\nWinglet\n"));
        assert!(text.contains("8          1.0\n"));
        assert!(text.contains("0.000000  4.000000  0.000000  1.000000  0.0  3  1.0\n"));
        assert!(text.contains("0.500000  4.000000  1.000000  0.400000  0.0\n"));
    }

    #[test]
    fn test_airfoil_falls_back_to_naca() {
        assert_eq!(
            Airfoil::resolve(Some("/definitely/not/here.dat"), "2412"),
            Airfoil::Naca("2412".to_string())
        );
        assert_eq!(Airfoil::resolve(None, "0012"), Airfoil::Naca("0012".to_string()));
    }

    #[test]
    fn test_mass_file_units_and_values() {
        let g = rectangular_half_wing();
        let mut buf = Vec::new();
        write_mass(&mut buf, &g.mass).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Units: feet, lbm, lbm-ft^2"));
        assert!(text.contains("Lunit = 1.0 ft"));
        let last = text.lines().last().unwrap();
        let values: Vec<f64> = last.split_whitespace().map(|v| v.parse().unwrap()).collect();
        assert_eq!(values, vec![100.0, 0.25, 0.0, 0.0, 10.0, 20.0, 28.0, 0.0, 0.5, 0.0]);
    }
}
