use crate::band::BandSource;
use crate::clevel::complexity_level;
use crate::image::{ImageMode, ImageSubheader};
use crate::image_io::BlockCache;
use crate::overflow;
use crate::record::{Payload, Record, Segment};
use crate::{Location, NitfError};
use imseg::ImageBlocker;
use log::{debug, info};
use std::io::{self, Write};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Hand image data to the stream a whole block at a time.
    pub write_caching: bool,
    /// Move TREs that do not fit their section into overflow segments
    /// before writing.
    pub enforce_overflow: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            write_caching: false,
            enforce_overflow: true,
        }
    }
}

/// One band source per band of an image, read in row-major order across
/// every segment the image spans.
pub struct ImageSource {
    bands: Vec<Box<dyn BandSource>>,
}

impl ImageSource {
    pub fn new(bands: Vec<Box<dyn BandSource>>) -> ImageSource {
        ImageSource { bands }
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }
}

struct Attachment {
    segments: Range<usize>,
    source: ImageSource,
}

// Where an image segment's data comes from at write time.
struct ImagePlan {
    attachment: usize,
    blocker: usize,
    blocker_segment: usize,
}

pub struct Writer<W: Write> {
    stream: W,
    options: WriterOptions,
    attachments: Vec<Attachment>,
}

fn payload_length(payload: &Payload, location: Location) -> Result<u64, NitfError> {
    match payload {
        Payload::Bytes(data) => Ok(data.len() as u64),
        Payload::Tres(tres) => tres
            .encoded_len()
            .map(|n| n as u64)
            .map_err(|source| NitfError::Tre { location, source }),
        Payload::Unread => Err(NitfError::ToWrite {
            location,
            reason: "segment data has not been read or supplied".to_owned(),
        }),
    }
}

fn write_payload<W: Write>(
    stream: &mut W,
    payload: &Payload,
    location: Location,
) -> Result<u64, NitfError> {
    match payload {
        Payload::Bytes(data) => {
            stream.write_all(data)?;
            Ok(data.len() as u64)
        }
        Payload::Tres(tres) => {
            let data = tres
                .encode()
                .map_err(|source| NitfError::Tre { location, source })?;
            stream.write_all(&data)?;
            Ok(data.len() as u64)
        }
        Payload::Unread => Err(NitfError::ToWrite {
            location,
            reason: "segment data has not been read or supplied".to_owned(),
        }),
    }
}

fn encode_all<S>(
    segments: &[Segment<S>],
    encode: impl Fn(&S, usize) -> Result<Vec<u8>, NitfError>,
) -> Result<Vec<Vec<u8>>, NitfError> {
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| encode(&s.subheader, i))
        .collect()
}

// Emits one block row of every band in the layout IMODE asks for. Each
// band buffer holds `blocks_per_row` blocks of `block_bytes`.
fn interleave(
    out: &mut dyn Write,
    mode: ImageMode,
    bands: &[Vec<u8>],
    blocks_per_row: usize,
    block_bytes: usize,
    row_bytes: usize,
    bytes_per_pixel: usize,
) -> io::Result<()> {
    let mut pixels = Vec::new();
    for block in 0..blocks_per_row {
        let start = block * block_bytes;
        match mode {
            ImageMode::Block | ImageMode::Sequential => {
                for band in bands {
                    out.write_all(&band[start..start + block_bytes])?;
                }
            }
            ImageMode::Row => {
                for row in (start..start + block_bytes).step_by(row_bytes) {
                    for band in bands {
                        out.write_all(&band[row..row + row_bytes])?;
                    }
                }
            }
            ImageMode::Pixel => {
                pixels.clear();
                for pixel in (start..start + block_bytes).step_by(bytes_per_pixel) {
                    for band in bands {
                        pixels.extend_from_slice(&band[pixel..pixel + bytes_per_pixel]);
                    }
                }
                out.write_all(&pixels)?;
            }
        }
    }
    Ok(())
}

/// Streams one segment's share of an attached image.
fn write_image_data(
    out: &mut dyn Write,
    subheader: &ImageSubheader,
    blocker: &ImageBlocker,
    segment: usize,
    source: &mut ImageSource,
    location: Location,
) -> Result<u64, NitfError> {
    let layout = blocker.segment(segment).ok_or(NitfError::ToWrite {
        location,
        reason: "segment outside its image".to_owned(),
    })?;
    let bpp = subheader.bytes_per_pixel() as usize;
    let num_cols = blocker.num_cols() as usize;
    let blocks_per_row = layout.blocks_per_row() as usize;
    let block_rows = layout.block_rows();
    let block_bytes = block_rows as usize * layout.block_cols() as usize * bpp;
    let row_bytes = layout.block_cols() as usize * bpp;
    let num_bands = source.bands.len();

    let block_row_starts: Vec<u64> = (0..layout.num_rows()).step_by(block_rows as usize).collect();
    let mut src = Vec::new();
    let mut written = 0u64;

    let mut block_row = |band: usize, local: u64, dst: &mut Vec<u8>| -> Result<(), NitfError> {
        let rows = block_rows.min(layout.num_rows() - local);
        src.resize(rows as usize * num_cols * bpp, 0);
        source.bands[band].read(&mut src)?;
        dst.clear();
        dst.resize(blocks_per_row * block_bytes, 0);
        blocker.block(&src, layout.first_row() + local, rows, bpp, dst)?;
        Ok(())
    };

    if subheader.mode == ImageMode::Sequential {
        let mut blocked = Vec::new();
        for band in 0..num_bands {
            for &local in &block_row_starts {
                block_row(band, local, &mut blocked)?;
                out.write_all(&blocked)?;
                written += blocked.len() as u64;
            }
        }
    } else {
        let mut blocked = vec![Vec::new(); num_bands];
        for &local in &block_row_starts {
            for (band, dst) in blocked.iter_mut().enumerate() {
                block_row(band, local, dst)?;
            }
            interleave(
                out,
                subheader.mode,
                &blocked,
                blocks_per_row,
                block_bytes,
                row_bytes,
                bpp,
            )?;
            written += (blocks_per_row * block_bytes * num_bands) as u64;
        }
    }
    debug!("{}: {} image bytes", location, written);
    Ok(written)
}

impl<W: Write> Writer<W> {
    pub fn new(stream: W, options: WriterOptions) -> Writer<W> {
        Writer {
            stream,
            options,
            attachments: Vec::new(),
        }
    }

    /// Supplies the pixels of the image made of the image segments in
    /// `segments`, as created by `Record::new_segmented_image`.
    pub fn attach_image(&mut self, segments: Range<usize>, source: ImageSource) {
        self.attachments.push(Attachment { segments, source });
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    // Blockers for the attached images and the plan of every image segment.
    fn plan_images(
        &self,
        record: &Record,
    ) -> Result<(Vec<ImageBlocker>, Vec<Option<ImagePlan>>), NitfError> {
        let mut plans: Vec<Option<ImagePlan>> = record.images.iter().map(|_| None).collect();
        let mut blockers = Vec::with_capacity(self.attachments.len());

        for (a, attachment) in self.attachments.iter().enumerate() {
            let range = attachment.segments.clone();
            let location = Location::Image(range.start);
            let segments = record.images.get(range.clone()).ok_or(NitfError::ToWrite {
                location,
                reason: format!("image source for missing segments {:?}", range),
            })?;
            let first = match segments.first() {
                Some(first) => &first.subheader,
                None => continue,
            };

            let rows: Vec<u64> = segments.iter().map(|s| s.subheader.num_rows).collect();
            let blocker = ImageBlocker::new(
                &rows,
                first.num_cols,
                first.effective_block_rows(),
                first.effective_block_cols(),
            )?;

            for (k, segment) in segments.iter().enumerate() {
                let index = range.start + k;
                let location = Location::Image(index);
                let subheader = &segment.subheader;
                let problem = if plans[index].is_some() {
                    Some("segment has two image sources".to_owned())
                } else if subheader.is_compressed() || subheader.bits_per_pixel % 8 != 0 {
                    Some(format!(
                        "only uncompressed whole-byte pixels can be written, not {} at {} bits",
                        subheader.compression, subheader.bits_per_pixel
                    ))
                } else if subheader.num_bands() != attachment.source.num_bands() {
                    Some(format!(
                        "{} bands in the subheader, {} sources",
                        subheader.num_bands(),
                        attachment.source.num_bands()
                    ))
                } else if subheader.num_cols != first.num_cols
                    || subheader.bits_per_pixel != first.bits_per_pixel
                {
                    Some("segments of one image differ in NCOLS or NBPP".to_owned())
                } else {
                    let layout = blocker.segment(k).ok_or(NitfError::SizeOverflow)?;
                    if subheader.blocks_per_row != layout.blocks_per_row()
                        || subheader.blocks_per_col != layout.blocks_per_col()
                        || subheader.effective_block_rows() != layout.block_rows()
                        || subheader.effective_block_cols() != layout.block_cols()
                    {
                        Some(format!(
                            "blocking {}x{} of {}x{} does not match the image's {}x{} of {}x{}",
                            subheader.blocks_per_col,
                            subheader.blocks_per_row,
                            subheader.effective_block_rows(),
                            subheader.effective_block_cols(),
                            layout.blocks_per_col(),
                            layout.blocks_per_row(),
                            layout.block_rows(),
                            layout.block_cols()
                        ))
                    } else {
                        None
                    }
                };
                if let Some(reason) = problem {
                    return Err(NitfError::ToWrite { location, reason });
                }
                plans[index] = Some(ImagePlan {
                    attachment: a,
                    blocker: blockers.len(),
                    blocker_segment: k,
                });
            }
            blockers.push(blocker);
        }
        Ok((blockers, plans))
    }

    /// Computes every length, the overflow indexes and CLEVEL, then writes
    /// the header and every segment. Returns the file length.
    pub fn write(&mut self, record: &mut Record) -> Result<u64, NitfError> {
        info!("Record write start");
        if self.options.enforce_overflow {
            record.enforce_limits()?;
        }
        record.validate_counts()?;
        overflow::assign_overflow_indexes(record);

        let (blockers, plans) = self.plan_images(record)?;

        let images = encode_all(&record.images, ImageSubheader::encode)?;
        let graphics = encode_all(&record.graphics, |s, i| s.encode(i))?;
        let texts = encode_all(&record.texts, |s, i| s.encode(i))?;
        let data_extensions = encode_all(&record.data_extensions, |s, i| s.encode(i))?;
        let reserved_extensions = encode_all(&record.reserved_extensions, |s, i| s.encode(i))?;

        for (i, segment) in record.images.iter().enumerate() {
            let data_length = match &plans[i] {
                Some(plan) => {
                    let layout = blockers[plan.blocker]
                        .segment(plan.blocker_segment)
                        .ok_or(NitfError::SizeOverflow)?;
                    layout
                        .band_bytes(segment.subheader.bytes_per_pixel())?
                        .checked_mul(segment.subheader.num_bands() as u64)
                        .ok_or(NitfError::SizeOverflow)?
                }
                None => payload_length(&segment.payload, Location::Image(i))?,
            };
            record.header.images[i].subheader_length = images[i].len() as u64;
            record.header.images[i].data_length = data_length;
        }
        let groups = [
            (&mut record.header.graphics, &graphics),
            (&mut record.header.texts, &texts),
            (&mut record.header.data_extensions, &data_extensions),
            (&mut record.header.reserved_extensions, &reserved_extensions),
        ];
        for (infos, encoded) in groups {
            for (info, subheader) in infos.iter_mut().zip(encoded.iter()) {
                info.subheader_length = subheader.len() as u64;
            }
        }
        for (i, s) in record.graphics.iter().enumerate() {
            record.header.graphics[i].data_length = payload_length(&s.payload, Location::Graphic(i))?;
        }
        for (i, s) in record.texts.iter().enumerate() {
            record.header.texts[i].data_length = payload_length(&s.payload, Location::Text(i))?;
        }
        for (i, s) in record.data_extensions.iter().enumerate() {
            record.header.data_extensions[i].data_length =
                payload_length(&s.payload, Location::DataExtension(i))?;
        }
        for (i, s) in record.reserved_extensions.iter().enumerate() {
            record.header.reserved_extensions[i].data_length =
                payload_length(&s.payload, Location::ReservedExtension(i))?;
        }

        // HL does not depend on the value of HL, FL or CLEVEL.
        record.header.header_length = 0;
        record.header.header_length = record.header.encode()?.len() as u64;
        let header = &record.header;
        let file_length = [
            &header.images,
            &header.graphics,
            &header.texts,
            &header.data_extensions,
            &header.reserved_extensions,
        ]
        .iter()
        .flat_map(|infos| infos.iter())
        .try_fold(header.header_length, |acc, info| {
            acc.checked_add(info.subheader_length)?
                .checked_add(info.data_length)
        })
        .ok_or(NitfError::SizeOverflow)?;
        record.header.file_length = file_length;
        record.header.complexity_level = complexity_level(record);
        let header_bytes = record.header.encode()?;
        info!(
            "Record layout: HL {}, FL {}, CLEVEL {:02}",
            header_bytes.len(),
            file_length,
            record.header.complexity_level
        );

        let Writer {
            stream,
            options,
            attachments,
        } = self;
        stream.write_all(&header_bytes)?;

        for (i, segment) in record.images.iter().enumerate() {
            let location = Location::Image(i);
            stream.write_all(&images[i])?;
            let expected = record.header.images[i].data_length;
            let written = match &plans[i] {
                Some(plan) => {
                    let blocker = &blockers[plan.blocker];
                    let source = &mut attachments[plan.attachment].source;
                    if options.write_caching {
                        let block_size = segment.subheader.effective_block_rows()
                            * segment.subheader.effective_block_cols()
                            * segment.subheader.bytes_per_pixel();
                        let mut cache = BlockCache::new(&mut *stream, block_size as usize);
                        let written = write_image_data(
                            &mut cache,
                            &segment.subheader,
                            blocker,
                            plan.blocker_segment,
                            source,
                            location,
                        )?;
                        cache.flush()?;
                        written
                    } else {
                        write_image_data(
                            &mut *stream,
                            &segment.subheader,
                            blocker,
                            plan.blocker_segment,
                            source,
                            location,
                        )?
                    }
                }
                None => write_payload(stream, &segment.payload, location)?,
            };
            if written != expected {
                return Err(NitfError::ToWrite {
                    location,
                    reason: format!("wrote {} image bytes, expected {}", written, expected),
                });
            }
        }
        for (i, segment) in record.graphics.iter().enumerate() {
            stream.write_all(&graphics[i])?;
            write_payload(stream, &segment.payload, Location::Graphic(i))?;
        }
        for (i, segment) in record.texts.iter().enumerate() {
            stream.write_all(&texts[i])?;
            write_payload(stream, &segment.payload, Location::Text(i))?;
        }
        for (i, segment) in record.data_extensions.iter().enumerate() {
            stream.write_all(&data_extensions[i])?;
            write_payload(stream, &segment.payload, Location::DataExtension(i))?;
        }
        for (i, segment) in record.reserved_extensions.iter().enumerate() {
            stream.write_all(&reserved_extensions[i])?;
            write_payload(stream, &segment.payload, Location::ReservedExtension(i))?;
        }
        stream.flush()?;
        info!("Record write finish, {} bytes", file_length);
        Ok(file_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::MemorySource;

    #[test]
    fn test_interleave_modes() {
        // One block row of two 2x2 blocks per band, 1 byte pixels.
        let a: Vec<u8> = (0..8).collect();
        let b: Vec<u8> = (10..18).collect();
        let bands = vec![a, b];
        let run = |mode| {
            let mut out = Vec::new();
            interleave(&mut out, mode, &bands, 2, 4, 2, 1).unwrap();
            out
        };
        assert_eq!(
            run(ImageMode::Block),
            vec![0, 1, 2, 3, 10, 11, 12, 13, 4, 5, 6, 7, 14, 15, 16, 17]
        );
        assert_eq!(
            run(ImageMode::Row),
            vec![0, 1, 10, 11, 2, 3, 12, 13, 4, 5, 14, 15, 6, 7, 16, 17]
        );
        assert_eq!(
            run(ImageMode::Pixel),
            vec![0, 10, 1, 11, 2, 12, 3, 13, 4, 14, 5, 15, 6, 16, 7, 17]
        );
    }

    #[test]
    fn test_unread_payload_rejected() {
        let mut record = Record::new();
        record.new_text_segment();
        let mut writer = Writer::new(Vec::new(), WriterOptions::default());
        assert!(matches!(
            writer.write(&mut record),
            Err(NitfError::ToWrite {
                location: Location::Text(0),
                ..
            })
        ));
    }

    #[test]
    fn test_band_count_mismatch() {
        let mut record = Record::new();
        let segment = record.new_image_segment();
        segment.subheader.num_rows = 2;
        segment.subheader.num_cols = 2;
        segment.subheader.set_blocking(0, 0);

        let mut writer = Writer::new(Vec::new(), WriterOptions::default());
        let bands: Vec<Box<dyn BandSource>> = vec![
            Box::new(MemorySource::new(vec![0; 4])),
            Box::new(MemorySource::new(vec![0; 4])),
        ];
        writer.attach_image(0..1, ImageSource::new(bands));
        assert!(matches!(
            writer.write(&mut record),
            Err(NitfError::ToWrite { .. })
        ));
    }

    #[test]
    fn test_lengths_are_consistent() {
        let mut record = Record::new();
        let segment = record.new_image_segment();
        segment.subheader.num_rows = 3;
        segment.subheader.num_cols = 5;
        segment.subheader.set_blocking(2, 4);
        let text = record.new_text_segment();
        text.payload = Payload::Bytes(b"note".to_vec());

        let mut writer = Writer::new(Vec::new(), WriterOptions::default());
        let bands: Vec<Box<dyn BandSource>> = vec![Box::new(MemorySource::new(vec![7; 15]))];
        writer.attach_image(0..1, ImageSource::new(bands));
        let file_length = writer.write(&mut record).unwrap();
        let out = writer.into_inner();

        assert_eq!(out.len() as u64, file_length);
        assert_eq!(record.header.file_length, file_length);
        // 2x2 blocks of 2x4 pixels.
        assert_eq!(record.header.images[0].data_length, 32);
        assert_eq!(record.header.texts[0].data_length, 4);
        assert_eq!(&out[..9], b"NITF02.10");
    }
}
