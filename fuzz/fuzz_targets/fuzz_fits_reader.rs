#![no_main]

use std::io::Write;

use libfuzzer_sys::fuzz_target;
use platespec::fits::{FitsReader, HduKind};

fuzz_target!(|data: &[u8]| {
    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        return;
    };
    if file.write_all(data).is_err() {
        return;
    }

    // Malformed input must surface as an error, never a panic
    let Ok(mut fits) = FitsReader::open(file.path()) else {
        return;
    };
    let _ = fits.key_i64(0, "PLATEID");
    let _ = fits.key_f64(0, "COEFF0");
    let _ = fits.key_string(0, "CAMERAS");

    let Ok(hdus) = fits.hdus() else {
        return;
    };
    for (index, hdu) in hdus.iter().enumerate() {
        match &hdu.kind {
            HduKind::Image(_) => {
                let _ = fits.image(index);
            }
            HduKind::Table { columns, .. } => {
                for name in columns {
                    let _ = fits.column_i64(index, name);
                }
            }
            HduKind::Other => {}
        }
    }
});
