use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Root {
    pub aircraft: Aircraft,
    pub analysis: Analysis,
    pub controls: Controls,
    pub avl: Avl,
    pub paneling: Paneling,
    pub xfoil: Xfoil,
    pub reference: ReferenceConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Aircraft {
    pub name: String,
}

impl Default for Aircraft {
    fn default() -> Self {
        Self {
            name: "aircraft".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Analysis {
    /// [min, max, step] in degrees
    pub alpha_range: [f64; 3],
    /// [min, max, step] in degrees
    pub beta_range: [f64; 3],
    /// Shared by every case: the panel solver does not take per-case Mach in batch mode.
    pub mach: f64,
    pub reynolds_numbers: Vec<f64>,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            alpha_range: [-10.0, 20.0, 2.0],
            beta_range: [-5.0, 5.0, 2.0],
            mach: 0.1,
            reynolds_numbers: vec![1.0e6, 2.0e6, 5.0e6],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Controls {
    /// Same-sign deflection on both halves (pitch)
    pub symmetric_name: String,
    /// Opposite-sign deflection (roll)
    pub differential_name: String,
    pub symmetric_range: [f64; 3],
    pub differential_range: [f64; 3],
    /// Flight condition the deflection sweeps are run at
    pub sweep_alpha: f64,
    pub sweep_beta: f64,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            symmetric_name: "elevon".to_string(),
            differential_name: "aileron".to_string(),
            symmetric_range: [-30.0, 30.0, 10.0],
            differential_range: [-20.0, 20.0, 10.0],
            sweep_alpha: 0.0,
            sweep_beta: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Avl {
    pub executable: String,
    pub timeout_s: f64,
    pub probe_timeout_s: f64,
    /// Skip the availability probe and use the analytic model
    pub force_mock: bool,
    /// Keep per-case scripts and raw output under <out>/avl_outputs/
    pub keep_intermediate: bool,
}

impl Default for Avl {
    fn default() -> Self {
        Self {
            executable: "avl".to_string(),
            timeout_s: 60.0,
            probe_timeout_s: 5.0,
            force_mock: false,
            keep_intermediate: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Paneling {
    pub nchordwise: u32,
    /// Target spanwise panel width [ft]
    pub target_panel_width: f64,
    pub min_nspan: u32,
    pub max_nspan: u32,
    /// Target winglet panel height [ft]
    pub winglet_panel_height: f64,
    pub winglet_max_nspan: u32,
    pub airfoil_file: Option<String>,
    pub naca: String,
}

impl Default for Paneling {
    fn default() -> Self {
        Self {
            nchordwise: 12,
            target_panel_width: 0.4,
            min_nspan: 3,
            max_nspan: 40,
            winglet_panel_height: 0.5,
            winglet_max_nspan: 15,
            airfoil_file: None,
            naca: "0012".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Xfoil {
    pub executable: String,
    /// [min, max] in degrees
    pub alpha_range: [f64; 2],
    pub alpha_step: f64,
    pub n_critical: f64,
    pub max_iterations: u32,
    pub panel_count: u32,
    pub timeout_s: f64,
    pub airfoil_file: Option<String>,
    pub naca: String,
    pub force_mock: bool,
}

impl Default for Xfoil {
    fn default() -> Self {
        Self {
            executable: "xfoil".to_string(),
            alpha_range: [-10.0, 20.0],
            alpha_step: 0.5,
            n_critical: 9.0,
            max_iterations: 200,
            panel_count: 200,
            timeout_s: 60.0,
            airfoil_file: None,
            naca: "0012".to_string(),
            force_mock: false,
        }
    }
}

/// Explicit reference values. Any value given here wins over the computed one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub area: Option<f64>,
    pub span: Option<f64>,
    pub chord: Option<f64>,
    pub moment_reference: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_aspect_ratio: f64,
    pub min_aspect_ratio: f64,
    pub min_panel_points: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_aspect_ratio: 30.0,
            min_aspect_ratio: 2.0,
            min_panel_points: 3,
        }
    }
}

fn check_range(name: &str, r: &[f64; 3]) -> Result<()> {
    if !(r[2] > 0.0) {
        bail!("{} step must be positive", name);
    }
    if r[0] > r[1] {
        bail!("{} min must be <= max", name);
    }
    Ok(())
}

impl Root {
    /// Read and parse a TOML file. Returns the raw text too, for the manifest hash.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Root = toml::from_str(&text)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        Ok((cfg, text))
    }

    pub fn validate(&self) -> Result<()> {
        if self.aircraft.name.trim().is_empty() {
            bail!("aircraft.name must not be empty");
        }
        check_range("analysis.alpha_range", &self.analysis.alpha_range)?;
        check_range("analysis.beta_range", &self.analysis.beta_range)?;
        if self.analysis.mach < 0.0 {
            bail!("analysis.mach must be non-negative");
        }
        if self.analysis.reynolds_numbers.iter().any(|re| !(*re > 0.0)) {
            bail!("analysis.reynolds_numbers must all be positive");
        }

        check_range("controls.symmetric_range", &self.controls.symmetric_range)?;
        check_range("controls.differential_range", &self.controls.differential_range)?;
        if self.controls.symmetric_name == self.controls.differential_name {
            bail!("controls.symmetric_name and controls.differential_name must differ");
        }

        if !(self.avl.timeout_s > 0.0) || !(self.avl.probe_timeout_s > 0.0) {
            bail!("avl timeouts must be positive");
        }

        let p = &self.paneling;
        if p.nchordwise == 0 {
            bail!("paneling.nchordwise must be >= 1");
        }
        if !(p.target_panel_width > 0.0) || !(p.winglet_panel_height > 0.0) {
            bail!("paneling panel sizes must be positive");
        }
        if p.min_nspan == 0 || p.min_nspan > p.max_nspan {
            bail!("paneling.min_nspan must be in [1, max_nspan]");
        }
        if p.winglet_max_nspan < p.min_nspan {
            bail!("paneling.winglet_max_nspan must be >= min_nspan");
        }

        let x = &self.xfoil;
        if x.alpha_range[0] > x.alpha_range[1] {
            bail!("xfoil.alpha_range min must be <= max");
        }
        if !(x.alpha_step > 0.0) {
            bail!("xfoil.alpha_step must be positive");
        }
        if !(x.timeout_s > 0.0) {
            bail!("xfoil.timeout_s must be positive");
        }
        if x.max_iterations == 0 {
            bail!("xfoil.max_iterations must be >= 1");
        }

        let r = &self.reference;
        for (name, v) in [("area", r.area), ("span", r.span), ("chord", r.chord)] {
            if let Some(v) = v {
                if !(v > 0.0) {
                    bail!("reference.{} must be positive", name);
                }
            }
        }

        if self.validation.min_aspect_ratio > self.validation.max_aspect_ratio {
            bail!("validation.min_aspect_ratio must be <= max_aspect_ratio");
        }
        if self.validation.min_panel_points < 2 {
            bail!("validation.min_panel_points must be >= 2");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        Root::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: Root = toml::from_str(
            r#"
            [aircraft]
            name = "flying_wing"

            [analysis]
            alpha_range = [-4.0, 8.0, 4.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.aircraft.name, "flying_wing");
        assert_eq!(cfg.analysis.alpha_range, [-4.0, 8.0, 4.0]);
        assert_eq!(cfg.analysis.beta_range, [-5.0, 5.0, 2.0]);
        assert_eq!(cfg.avl.timeout_s, 60.0);
        assert_eq!(cfg.paneling.naca, "0012");
        cfg.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_range() {
        let mut cfg = Root::default();
        cfg.analysis.alpha_range = [0.0, 10.0, 0.0];
        assert!(cfg.validate().is_err());
        cfg.analysis.alpha_range = [10.0, 0.0, 1.0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_nonpositive_reference_override() {
        let mut cfg = Root::default();
        cfg.reference.chord = Some(0.0);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("reference.chord"));
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Root::default()).unwrap();
        let back: Root = toml::from_str(&text).unwrap();
        assert_eq!(back.paneling.max_nspan, 40);
        assert_eq!(back.controls.symmetric_name, "elevon");
    }
}
