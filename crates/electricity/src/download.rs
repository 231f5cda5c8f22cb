use std::fs::{self, File};
use std::path::{Path, PathBuf};

use burn::data::network::downloader;
use log::info;
use zip::ZipArchive;

use crate::error::{ElectricityError, Result};

const URL: &str = "https://archive.ics.uci.edu/ml/machine-learning-databases/00321/LD2011_2014.txt.zip";

pub const DATA_FILE: &str = "LD2011_2014.txt";

pub fn data_path<A: AsRef<Path>>(data_folder: A) -> PathBuf {
	data_folder.as_ref().join(DATA_FILE)
}

/// Path of the readings file, downloading the archive first when it is missing.
pub fn ensure_downloaded<A: AsRef<Path>>(data_folder: A) -> Result<PathBuf> {
	let path = data_path(data_folder);

	if !path.is_file() {
		download(&path)?;
	}

	Ok(path)
}

pub fn download(data_path: &Path) -> Result<()> {
	let data_folder = data_path.parent().unwrap_or_else(|| Path::new("."));
	fs::create_dir_all(data_folder)?;

	let mut zip_path = data_path.as_os_str().to_owned();
	zip_path.push(".zip");
	let zip_path = PathBuf::from(zip_path);

	info!("Downloading {} to {}", URL, zip_path.display());
	let bytes = downloader::download_file_as_bytes(URL, "LD2011_2014.txt.zip");
	fs::write(&zip_path, bytes)?;

	unzip(&zip_path, data_folder)?;

	if !data_path.is_file() {
		return Err(ElectricityError::MissingArchiveEntry(DATA_FILE.to_string()));
	}

	info!("Done.");
	Ok(())
}

pub fn unzip(zip_path: &Path, destination: &Path) -> Result<()> {
	info!("Unzipping {} into {}", zip_path.display(), destination.display());

	let mut archive = ZipArchive::new(File::open(zip_path)?)?;
	archive.extract(destination)?;

	Ok(())
}
