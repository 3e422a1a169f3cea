//! Export melodies as MCSV, the input format of the FANTASTIC toolbox.
//!
//! Only the timing, pitch and segmentation fields are populated; the
//! remaining fields are written as 0. Phrase ends are marked in the
//! `temperley` column so the toolbox segments along the annotated phrases.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::corpus::{Corpus, Melody};
use crate::{Error, Result};

/// Ticks per beat used for the tick columns.
pub const DEFAULT_TICKS: u32 = 3072;

const FIRST_LINE: &str = "FANTASTIC expects a first line";

const COLUMNS: [&str; 15] = [
    "onset", "onsetics", "takt", "beat", "ticks", "pitch", "durs", "durtics", "dur16", "LBDM1",
    "LBDM2", "refLBDM1", "refLBDM2", "temperley", "dummy",
];

/// Write one melody as MCSV.
pub fn write_mcsv<W: Write>(melody: &Melody, mut writer: W, ticks: u32) -> Result<()> {
    writeln!(writer, "{}", FIRST_LINE).map_err(csv::Error::from)?;

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(writer);
    csv_writer.write_record(COLUMNS)?;

    let ticks = ticks as f64;
    let symbols = &melody.symbols;
    for (i, s) in symbols.iter().enumerate() {
        let phrase_end = symbols
            .get(i + 1)
            .map_or(true, |next| next.phrase_id > s.phrase_id);

        let record = [
            format!("{:?}", s.onset),
            ((s.onset * ticks) as i64).to_string(),
            "0".into(),
            "0".into(),
            "0".into(),
            s.pitch.to_string(),
            format!("{:?}", s.ioi),
            ((s.ioi * ticks) as i64).to_string(),
            ((s.ioi * 16.0) as i64).to_string(),
            "0".into(),
            "0".into(),
            "0".into(),
            "0".into(),
            (if phrase_end { "1" } else { "0" }).to_string(),
            "0".into(),
        ];
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write every melody of the corpus to `<dir>/<filename>.csv`.
pub fn export_corpus(corpus: &Corpus, dir: &Path, ticks: u32) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut written = Vec::with_capacity(corpus.len());
    for melody in corpus.melodies() {
        let path = dir.join(format!("{}.csv", melody.filename));
        let file = std::fs::File::create(&path).map_err(|e| Error::io(&path, e))?;
        write_mcsv(melody, std::io::BufWriter::new(file), ticks)?;
        info!(filename = %melody.filename, path = %path.display(), "exported mcsv");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Symbol;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn melody() -> Melody {
        Melody::new(
            "tune1",
            vec![
                Symbol::new(0.0, 0.5, 60, 0),
                Symbol::new(0.5, 1.5, 62, 0),
                Symbol::new(2.0, 1.0, 64, 1),
            ],
        )
    }

    #[test]
    fn mcsv_layout() {
        let mut out = Vec::new();
        write_mcsv(&melody(), &mut out, DEFAULT_TICKS).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "FANTASTIC expects a first line");
        assert_eq!(
            lines[1],
            "onset;onsetics;takt;beat;ticks;pitch;durs;durtics;dur16;LBDM1;LBDM2;refLBDM1;refLBDM2;temperley;dummy"
        );
        assert_eq!(lines[2], "0.0;0;0;0;0;60;0.5;1536;8;0;0;0;0;0;0");
        assert_eq!(lines[3], "0.5;1536;0;0;0;62;1.5;4608;24;0;0;0;0;1;0");
        assert_eq!(lines[4], "2.0;6144;0;0;0;64;1.0;3072;16;0;0;0;0;1;0");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn export_writes_one_file_per_melody() {
        let dir = TempDir::new().unwrap();
        let corpus = Corpus::from(vec![melody(), Melody::new("tune2", vec![])]);
        let paths = export_corpus(&corpus, &dir.path().join("mcsv"), DEFAULT_TICKS).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("tune1.csv"));
        let empty = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(empty.lines().count(), 2);
    }
}
