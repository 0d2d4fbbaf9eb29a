use crate::image::{ImageMode, ImageSubheader};
use crate::record::Record;
use log::debug;

fn extent_level(extent: i64) -> u64 {
    match extent {
        e if e <= 2_047 => 3,
        e if e <= 8_191 => 5,
        e if e <= 65_535 => 6,
        e if e <= 99_999_999 => 7,
        _ => 9,
    }
}

fn file_size_level(length: u64) -> u64 {
    match length {
        l if l <= 52_428_799 => 3,
        l if l <= 1_073_741_823 => 5,
        l if l <= 2_147_483_647 => 6,
        l if l <= 10_737_418_239 => 7,
        _ => 9,
    }
}

fn block_level(image: &ImageSubheader) -> u64 {
    // NPPBH/NPPBV of 0 mark an unblocked dimension over 8192 pixels.
    if image.block_rows == 0 || image.block_cols == 0 {
        return 9;
    }
    match image.block_rows.max(image.block_cols) {
        s if s <= 2_048 => 3,
        s if s <= 8_192 => 5,
        _ => 6,
    }
}

fn attribute_level(image: &ImageSubheader) -> u64 {
    let nbpp = image.bits_per_pixel;
    let bands = image.num_bands();
    match image.representation.trim() {
        "MONO" => {
            if bands == 1
                && matches!(nbpp, 1 | 8 | 12 | 16 | 32 | 64)
                && image.mode == ImageMode::Block
            {
                3
            } else {
                9
            }
        }
        "RGB" => match (bands, nbpp) {
            (3, 8) => 3,
            (3, 16) | (3, 32) => 6,
            _ => 9,
        },
        "RGB/LUT" => {
            if bands == 1 && matches!(nbpp, 1 | 8) && image.mode == ImageMode::Block {
                3
            } else {
                9
            }
        }
        _ => 3,
    }
}

fn image_level(image: &ImageSubheader) -> u64 {
    let row_extent = image.location.row + image.num_rows as i64;
    let col_extent = image.location.col + image.num_cols as i64;
    let iloc = extent_level(row_extent.max(col_extent));
    let size = extent_level(image.num_rows.max(image.num_cols) as i64);
    iloc.max(size)
        .max(block_level(image))
        .max(attribute_level(image))
}

/// CLEVEL for a record whose FL is already set: the highest level any of
/// the file length, segment counts or image attributes require.
pub fn complexity_level(record: &Record) -> u64 {
    let mut level = file_size_level(record.header.file_length);
    for (i, image) in record.images.iter().enumerate() {
        let image_level = image_level(&image.subheader);
        debug!("image segment {} needs CLEVEL {:02}", i, image_level);
        level = level.max(image_level);
    }
    if record.images.len() > 20 {
        level = level.max(5);
    }
    let num_des = record.data_extensions.len();
    if num_des > 10 {
        let des_level = match num_des {
            n if n <= 50 => 6,
            n if n <= 100 => 7,
            _ => 9,
        };
        level = level.max(des_level);
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Offset;
    use crate::image::BandInfo;

    fn image(rows: u64, cols: u64) -> ImageSubheader {
        let mut image = ImageSubheader {
            num_rows: rows,
            num_cols: cols,
            ..ImageSubheader::default()
        };
        image.set_blocking(1024, 1024);
        image
    }

    #[test]
    fn test_small_file() {
        let mut record = Record::new();
        record.new_image_segment().subheader = image(512, 512);
        assert_eq!(complexity_level(&record), 3);
    }

    #[test]
    fn test_image_extent() {
        let mut record = Record::new();
        record.new_image_segment().subheader = image(1000, 1000);
        record.images[0].subheader.location = Offset::new(6_000, 0);
        assert_eq!(complexity_level(&record), 5);

        record.images[0].subheader = image(70_000, 100);
        assert_eq!(complexity_level(&record), 7);
    }

    #[test]
    fn test_file_length() {
        let mut record = Record::new();
        record.header.file_length = 60_000_000;
        assert_eq!(complexity_level(&record), 5);
        record.header.file_length = 20_000_000_000;
        assert_eq!(complexity_level(&record), 9);
    }

    #[test]
    fn test_des_count() {
        let mut record = Record::new();
        for _ in 0..11 {
            record.new_data_extension_segment();
        }
        assert_eq!(complexity_level(&record), 6);
        for _ in 0..40 {
            record.new_data_extension_segment();
        }
        assert_eq!(complexity_level(&record), 7);
    }

    #[test]
    fn test_rgb_attributes() {
        let mut rgb = image(100, 100);
        rgb.representation = "RGB".to_owned();
        rgb.bands = vec![BandInfo::default(); 3];
        assert_eq!(attribute_level(&rgb), 3);
        rgb.bits_per_pixel = 16;
        assert_eq!(attribute_level(&rgb), 6);
        rgb.bands.pop();
        assert_eq!(attribute_level(&rgb), 9);
    }

    #[test]
    fn test_block_size() {
        let mut big = image(20_000, 20_000);
        big.set_blocking(4096, 4096);
        assert_eq!(block_level(&big), 5);
        big.set_blocking(16_384, 16_384);
        assert_eq!(block_level(&big), 6);
        big.set_blocking(0, 0);
        assert_eq!(block_level(&big), 9);
    }
}
