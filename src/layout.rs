use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;

use crate::config::RunConfig;
use crate::error::AfError;

/// On-disk layout of one run: `{output_dir}/{run_name}/...`.
#[derive(Debug, Clone)]
pub struct RunLayout {
    run_name: String,
    run_dir: Utf8PathBuf,
}

impl RunLayout {
    pub fn new(config: &RunConfig) -> Self {
        Self::new_with_paths(&config.output_dir, &config.run_name)
    }

    pub fn new_with_paths(output_dir: &Utf8Path, run_name: &str) -> Self {
        Self {
            run_name: run_name.to_string(),
            run_dir: output_dir.join(run_name),
        }
    }

    pub fn pdb_dir(&self) -> Utf8PathBuf {
        self.run_dir.join("pdbs")
    }

    pub fn resolver_csv(&self) -> Utf8PathBuf {
        self.run_dir.join(format!("{}_af_info.csv", self.run_name))
    }

    pub fn final_csv(&self) -> Utf8PathBuf {
        self.run_dir.join(format!("{}_af_pdbs.csv", self.run_name))
    }

    pub fn guess_csv(&self) -> Utf8PathBuf {
        self.run_dir
            .join(format!("{}_af_pdbs_guess.csv", self.run_name))
    }

    pub fn ensure_run_dir(&self) -> Result<(), AfError> {
        fs::create_dir_all(self.run_dir.as_std_path())
            .map_err(|err| AfError::Filesystem(err.to_string()))
    }
}

/// Fails when `path` is already on disk.
pub fn ensure_absent(path: &Utf8Path) -> Result<(), AfError> {
    if path.as_std_path().exists() {
        return Err(AfError::OutputAlreadyExists(path.as_std_path().to_path_buf()));
    }
    Ok(())
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), AfError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| AfError::Filesystem(format!("create {path}: {err}")))
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, AfError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| AfError::Filesystem(format!("read dir {dir}: {err}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| AfError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => files.push(path),
            Err(path) => tracing::warn!(path = %path.display(), "skipping non-utf8 file name"),
        }
    }
    files.sort();
    Ok(files)
}

/// Copies `source` to `dest` through a temp file in the destination directory,
/// gunzipping on the way when the source ends in `.gz`.
pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), AfError> {
    let parent = dest
        .parent()
        .ok_or_else(|| AfError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| AfError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kira-af-copy")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| AfError::Filesystem(err.to_string()))?;

    let input = fs::File::open(source.as_std_path())
        .map_err(|err| AfError::Filesystem(format!("open {source}: {err}")))?;
    let copied = if source.extension() == Some("gz") {
        io::copy(&mut GzDecoder::new(input), temp.as_file_mut())
    } else {
        io::copy(&mut io::BufReader::new(input), temp.as_file_mut())
    };
    copied.map_err(|err| AfError::Filesystem(format!("copy {source}: {err}")))?;
    temp.as_file_mut()
        .flush()
        .map_err(|err| AfError::Filesystem(err.to_string()))?;

    temp.persist(dest.as_std_path())
        .map_err(|err| AfError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn layout_paths() {
        let layout = RunLayout::new_with_paths(Utf8Path::new("out"), "kinases");
        assert!(layout.pdb_dir().ends_with("kinases/pdbs"));
        assert!(layout.resolver_csv().ends_with("kinases/kinases_af_info.csv"));
        assert!(layout.final_csv().ends_with("kinases/kinases_af_pdbs.csv"));
        assert!(
            layout
                .guess_csv()
                .ends_with("kinases/kinases_af_pdbs_guess.csv")
        );
    }

    #[test]
    fn gz_sources_are_decompressed() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let source = root.join("AF-X-F1-model_v4.pdb.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"ATOM      1  N   MET A   1\n").unwrap();
        fs::write(source.as_std_path(), encoder.finish().unwrap()).unwrap();

        let dest = root.join("out").join("AF-X-F1-model_v4.pdb");
        copy_file_atomic(&source, &dest).unwrap();
        let content = fs::read_to_string(dest.as_std_path()).unwrap();
        assert!(content.starts_with("ATOM"));
    }

    #[test]
    fn list_files_skips_directories() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::create_dir(root.join("nested").as_std_path()).unwrap();
        fs::write(root.join("b.pdb").as_std_path(), b"").unwrap();
        fs::write(root.join("a.pdb").as_std_path(), b"").unwrap();

        let files = list_files(&root).unwrap();
        let names: Vec<_> = files.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, vec!["a.pdb", "b.pdb"]);
    }
}
