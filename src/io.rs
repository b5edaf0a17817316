use crate::controls::ControlDerivatives;
use crate::polar::PolarCurve;
use crate::record::{Axis, Coef, DerivativeRecord};
use anyhow::Result;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Stability derivative columns of the derivative table, in order.
const DERIVATIVE_COLUMNS: [(Axis, Coef); 8] = [
    (Axis::Alpha, Coef::Lift),
    (Axis::Alpha, Coef::Pitch),
    (Axis::Beta, Coef::Side),
    (Axis::Beta, Coef::Roll),
    (Axis::Beta, Coef::Yaw),
    (Axis::P, Coef::Roll),
    (Axis::Q, Coef::Pitch),
    (Axis::R, Coef::Yaw),
];

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.6}", x)).unwrap_or_default()
}

fn quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub struct CsvWriter<W: Write = BufWriter<File>> {
    w: W,
}

impl CsvWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self { w: BufWriter::new(f) })
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    // ------------------------------------------------------------------------
    // Per-case derivative table
    // ------------------------------------------------------------------------

    pub fn write_derivative_header(&mut self) -> Result<()> {
        let mut cols: Vec<String> = ["case", "alpha", "beta", "mach", "symmetric", "differential", "converged"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        cols.extend(Coef::ALL.iter().map(|c| c.label().to_string()));
        cols.extend(
            DERIVATIVE_COLUMNS
                .iter()
                .map(|(a, c)| format!("{}{}", c.label(), a.suffix())),
        );
        cols.push("Xnp".to_string());
        cols.push("failure".to_string());
        writeln!(self.w, "{}", cols.join(","))?;
        Ok(())
    }

    pub fn write_derivative_row(&mut self, r: &DerivativeRecord) -> Result<()> {
        let c = &r.case;
        let mut fields = vec![
            c.name.clone(),
            format!("{:.4}", c.alpha),
            format!("{:.4}", c.beta),
            format!("{:.4}", c.mach),
            format!("{:.4}", c.symmetric),
            format!("{:.4}", c.differential),
            r.converged.to_string(),
        ];
        fields.extend(Coef::ALL.iter().map(|k| format!("{:.6}", r.coefficient(*k))));
        fields.extend(DERIVATIVE_COLUMNS.iter().map(|(a, k)| opt(r.derivatives.get(*a, *k))));
        fields.push(opt(r.xnp));
        fields.push(r.failure.as_ref().map(|f| quote(&f.to_string())).unwrap_or_default());
        writeln!(self.w, "{}", fields.join(","))?;
        Ok(())
    }

    /// One row per case name; a repeated name keeps its first record.
    /// Returns the number of rows written.
    pub fn write_derivative_rows<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a DerivativeRecord>,
    ) -> Result<usize> {
        let mut seen = BTreeSet::new();
        for r in records {
            if seen.insert(r.case.name.as_str()) {
                self.write_derivative_row(r)?;
            }
        }
        Ok(seen.len())
    }

    // ------------------------------------------------------------------------
    // Control derivatives: one row per control and coefficient
    // ------------------------------------------------------------------------

    pub fn write_control_header(&mut self) -> Result<()> {
        writeln!(
            self.w,
            "control,kind,alpha,beta,points,coefficient,per_deg,intercept,r_squared"
        )?;
        Ok(())
    }

    pub fn write_control_rows(&mut self, d: &ControlDerivatives) -> Result<()> {
        let kind = match d.kind {
            crate::run_matrix::ControlKind::Symmetric => "symmetric",
            crate::run_matrix::ControlKind::Differential => "differential",
        };
        for c in Coef::ALL {
            if let Some(fit) = d.per_degree.get(c.label()) {
                writeln!(
                    self.w,
                    "{},{},{:.4},{:.4},{},{},{:.8},{:.6},{:.6}",
                    d.control,
                    kind,
                    d.alpha,
                    d.beta,
                    d.points,
                    c.label(),
                    fit.slope,
                    fit.intercept,
                    fit.r_squared
                )?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Airfoil polar
    // ------------------------------------------------------------------------

    pub fn write_polar(&mut self, p: &PolarCurve) -> Result<()> {
        writeln!(self.w, "alpha,CL,CD,CM")?;
        for pt in p.points() {
            writeln!(self.w, "{},{},{},{}", pt.alpha, pt.cl, pt.cd, pt.cm)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::estimate;
    use crate::error::CaseFailure;
    use crate::executor::MockModel;
    use crate::run_matrix::{control_sweep, ControlKind, RunCase};

    fn render<F: FnOnce(&mut CsvWriter<Vec<u8>>) -> Result<()>>(f: F) -> String {
        let mut w = CsvWriter::new(Vec::new());
        f(&mut w).unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn test_derivative_table_columns() {
        let m = MockModel::default();
        let ok = m.evaluate(&RunCase::new(2.0, 0.0, 0.1));
        let bad = DerivativeRecord::failed(
            RunCase::new(4.0, 0.0, 0.1),
            CaseFailure::MissingOutput {
                expected: vec!["a.txt".into(), "b.txt".into()],
            },
        );
        let text = render(|w| {
            w.write_derivative_header()?;
            w.write_derivative_row(&ok)?;
            w.write_derivative_row(&bad)
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let header: Vec<&str> = lines[0].split(',').collect();
        assert_eq!(&header[7..13], &["CL", "CD", "CY", "Cl", "Cm", "Cn"]);
        assert_eq!(header[13], "CLa");
        assert_eq!(header[20], "Cnr");
        assert!(lines[1].starts_with("a2.0_b0.0_M0.10,2.0000,0.0000,0.1000,0.0000,0.0000,true,"));
        // Unreported derivatives are blank, not zero
        assert!(lines[1].ends_with(",,"));
        assert!(lines[2].contains(",false,"));
        assert!(lines[2].ends_with("\"expected output missing: a.txt, b.txt\""));
    }

    #[test]
    fn test_shared_baseline_written_once() {
        let m = MockModel::default();
        let matrix: Vec<_> = [0.0, 2.0].iter().map(|a| m.evaluate(&RunCase::new(*a, 0.0, 0.1))).collect();
        let sweep: Vec<_> = control_sweep(ControlKind::Symmetric, &[-10.0, 0.0, 10.0], 0.0, 0.0, 0.1)
            .iter()
            .map(|c| m.evaluate(c))
            .collect();
        let mut rows = 0;
        let text = render(|w| {
            rows = w.write_derivative_rows(matrix.iter().chain(&sweep))?;
            Ok(())
        });
        assert_eq!(rows, 4);
        assert_eq!(text.lines().count(), 4);
        assert_eq!(text.matches("a0.0_b0.0_M0.10,").count(), 1);
    }

    #[test]
    fn test_control_rows() {
        let m = MockModel::default();
        let records: Vec<_> = control_sweep(ControlKind::Symmetric, &[-10.0, 0.0, 10.0], 0.0, 0.0, 0.1)
            .iter()
            .map(|c| m.evaluate(c))
            .collect();
        let d = estimate(&records, ControlKind::Symmetric, "elevon").unwrap();
        let text = render(|w| {
            w.write_control_header()?;
            w.write_control_rows(&d)
        });
        assert_eq!(text.lines().count(), 7);
        assert!(text.contains("elevon,symmetric,0.0000,0.0000,3,CL,0.01000000,"));
    }
}
