use crate::band::{BandSink, MemorySink};
use crate::des::DataExtensionSubheader;
use crate::fields::{decode_tres, TreContext};
use crate::graphic::GraphicSubheader;
use crate::header::{self, ComponentInfo, FileHeader, FIXED_LEN, HL_LEN, HL_OFFSET, MIN_LEN};
use crate::image::ImageSubheader;
use crate::image_io::ImageLayout;
use crate::record::{Payload, Record, Segment};
use crate::res::ReservedExtensionSubheader;
use crate::text::TextSubheader;
use crate::window::SubWindow;
use crate::{Location, NitfError, Warning};
use bcs::Kind;
use log::{debug, info, warn};
use std::io::{self, Read, Seek, SeekFrom};
use tre::Registry;

/// Progress of a [`Reader`]. Each step is only valid in the state before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unopened,
    HeaderRead,
    SegmentsIndexed,
    DataAccessible,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Fail on TREs that do not match their descriptor instead of keeping
    /// them raw.
    pub strict_tres: bool,
}

/// Reads `length` bytes at `offset` after checking they lie in the stream.
fn read_exact_at<R: Read + Seek>(
    stream: &mut R,
    stream_len: u64,
    offset: u64,
    length: u64,
    location: Location,
    what: &str,
) -> Result<Vec<u8>, NitfError> {
    let end = offset.checked_add(length).ok_or(NitfError::SizeOverflow)?;
    if end > stream_len {
        return Err(NitfError::Structural {
            location,
            reason: format!(
                "{} at {} of {} bytes ends past the stream length {}",
                what, offset, length, stream_len
            ),
        });
    }
    let length = usize::try_from(length).map_err(|_| NitfError::SizeOverflow)?;
    let mut data = vec![0u8; length];
    stream.seek(SeekFrom::Start(offset))?;
    stream.read_exact(&mut data)?;
    Ok(data)
}

/// Subheaders and data extents of one segment group, starting at `offset`.
fn index_group<R, S, F>(
    stream: &mut R,
    stream_len: u64,
    offset: &mut u64,
    infos: &[ComponentInfo],
    location: fn(usize) -> Location,
    mut decode: F,
) -> Result<Vec<Segment<S>>, NitfError>
where
    R: Read + Seek,
    F: FnMut(&[u8], usize) -> Result<S, NitfError>,
{
    let mut segments = Vec::with_capacity(infos.len());
    for (i, info) in infos.iter().enumerate() {
        let data = read_exact_at(
            stream,
            stream_len,
            *offset,
            info.subheader_length,
            location(i),
            "subheader",
        )?;
        let subheader = decode(&data, i)?;

        let data_offset = *offset + info.subheader_length;
        let data_end = data_offset
            .checked_add(info.data_length)
            .ok_or(NitfError::SizeOverflow)?;
        if data_end > stream_len {
            return Err(NitfError::Structural {
                location: location(i),
                reason: format!(
                    "data of {} bytes at {} ends past the stream length {}",
                    info.data_length, data_offset, stream_len
                ),
            });
        }
        segments.push(Segment {
            subheader,
            payload: Payload::Unread,
            data_offset,
            data_length: info.data_length,
        });
        *offset = data_end;
    }
    Ok(segments)
}

/// Staged reader over a seekable stream: header, then segment index, then
/// segment data.
#[derive(Debug)]
pub struct Reader<R> {
    stream: Option<R>,
    registry: Registry,
    options: ReaderOptions,
    state: ReaderState,
    stream_len: u64,
    record: Option<Record>,
    warnings: Vec<Warning>,
}

impl<R: Read + Seek> Reader<R> {
    pub fn new(stream: R, registry: Registry, options: ReaderOptions) -> Reader<R> {
        Reader {
            stream: Some(stream),
            registry,
            options,
            state: ReaderState::Unopened,
            stream_len: 0,
            record: None,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// TREs kept raw because they did not match their descriptor.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    fn require(&self, expected: ReaderState) -> Result<(), NitfError> {
        if self.state != expected {
            return Err(NitfError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn closed(&self) -> NitfError {
        NitfError::InvalidState {
            expected: ReaderState::DataAccessible,
            actual: ReaderState::Closed,
        }
    }

    /// Runs every stage up to data access.
    pub fn read(&mut self) -> Result<&Record, NitfError> {
        self.read_header()?;
        self.index_segments()?;
        self.validate()?;
        self.record.as_ref().ok_or_else(|| self.closed())
    }

    pub fn read_header(&mut self) -> Result<&FileHeader, NitfError> {
        self.require(ReaderState::Unopened)?;
        let stream = self.stream.as_mut().ok_or(NitfError::InvalidState {
            expected: ReaderState::Unopened,
            actual: ReaderState::Closed,
        })?;
        self.stream_len = stream.seek(SeekFrom::End(0))?;
        info!("Header read start, stream of {} bytes", self.stream_len);
        stream.seek(SeekFrom::Start(0))?;

        let mut data = vec![0u8; FIXED_LEN.min(self.stream_len as usize)];
        stream.read_exact(&mut data)?;
        header::check_signature(&data[..data.len().min(9)])?;
        if data.len() < FIXED_LEN {
            return Err(NitfError::Truncated {
                location: Location::FileHeader,
                field: "HL",
            });
        }

        let header_length = bcs::decode(&data[HL_OFFSET..HL_OFFSET + HL_LEN], HL_LEN, Kind::Numeric)
            .map_err(|source| NitfError::Field {
                location: Location::FileHeader,
                field: "HL",
                source,
            })?
            .as_u64()
            .unwrap_or(0);
        if header_length < MIN_LEN as u64 || header_length > self.stream_len {
            return Err(NitfError::Structural {
                location: Location::FileHeader,
                reason: format!(
                    "HL of {} outside {}..={}",
                    header_length, MIN_LEN, self.stream_len
                ),
            });
        }
        data.resize(header_length as usize, 0);
        stream.read_exact(&mut data[FIXED_LEN..])?;

        let mut ctx = TreContext {
            registry: &self.registry,
            strict: self.options.strict_tres,
            warnings: &mut self.warnings,
        };
        let header = FileHeader::decode(&data, &mut ctx)?;
        if header.file_length != self.stream_len {
            warn!(
                "FL is {} but the stream holds {} bytes",
                header.file_length, self.stream_len
            );
        }

        self.record = Some(Record {
            header,
            ..Record::default()
        });
        self.state = ReaderState::HeaderRead;
        info!("Header read finish");
        match &self.record {
            Some(record) => Ok(&record.header),
            None => Err(self.closed()),
        }
    }

    /// Reads every subheader and records where each segment's data lies.
    /// TRE_OVERFLOW data is decoded into the segment's payload.
    pub fn index_segments(&mut self) -> Result<&Record, NitfError> {
        self.require(ReaderState::HeaderRead)?;
        let Reader {
            stream,
            registry,
            options,
            stream_len,
            record,
            warnings,
            ..
        } = self;
        let (stream, record) = match (stream.as_mut(), record.as_mut()) {
            (Some(stream), Some(record)) => (stream, record),
            _ => {
                return Err(NitfError::InvalidState {
                    expected: ReaderState::HeaderRead,
                    actual: ReaderState::Closed,
                })
            }
        };
        let stream_len = *stream_len;
        let mut ctx = TreContext {
            registry,
            strict: options.strict_tres,
            warnings,
        };

        info!("Segment index start");
        let header = &record.header;
        let mut offset = header.header_length;
        record.images = index_group(
            stream,
            stream_len,
            &mut offset,
            &header.images,
            Location::Image,
            |data, i| ImageSubheader::decode(data, i, &mut ctx),
        )?;
        record.graphics = index_group(
            stream,
            stream_len,
            &mut offset,
            &header.graphics,
            Location::Graphic,
            |data, i| GraphicSubheader::decode(data, i, &mut ctx),
        )?;
        record.texts = index_group(
            stream,
            stream_len,
            &mut offset,
            &header.texts,
            Location::Text,
            |data, i| TextSubheader::decode(data, i, &mut ctx),
        )?;
        record.data_extensions = index_group(
            stream,
            stream_len,
            &mut offset,
            &header.data_extensions,
            Location::DataExtension,
            DataExtensionSubheader::decode,
        )?;
        record.reserved_extensions = index_group(
            stream,
            stream_len,
            &mut offset,
            &header.reserved_extensions,
            Location::ReservedExtension,
            ReservedExtensionSubheader::decode,
        )?;

        for (i, segment) in record.data_extensions.iter_mut().enumerate() {
            if !segment.subheader.is_overflow() {
                continue;
            }
            let location = Location::DataExtension(i);
            let data = read_exact_at(
                stream,
                stream_len,
                segment.data_offset,
                segment.data_length,
                location,
                "overflow data",
            )?;
            segment.payload = Payload::Tres(decode_tres(&data, location, &mut ctx)?);
            debug!("{}: TRE_OVERFLOW with {} bytes", location, data.len());
        }

        if offset != record.header.file_length {
            warn!(
                "segments end at {} but FL is {}",
                offset, record.header.file_length
            );
        }
        self.state = ReaderState::SegmentsIndexed;
        info!("Segment index finish, {} images", record.images.len());
        Ok(record)
    }

    /// Checks the indexed record and opens segment data for reading.
    pub fn validate(&mut self) -> Result<(), NitfError> {
        self.require(ReaderState::SegmentsIndexed)?;
        match &self.record {
            Some(record) => record.validate_counts()?,
            None => return Err(self.closed()),
        }
        self.state = ReaderState::DataAccessible;
        Ok(())
    }

    fn data_of<S>(
        stream: &mut R,
        stream_len: u64,
        segments: &[Segment<S>],
        index: usize,
        location: Location,
    ) -> Result<Vec<u8>, NitfError> {
        let segment = segments.get(index).ok_or_else(|| NitfError::Structural {
            location,
            reason: "no such segment".to_owned(),
        })?;
        read_exact_at(
            stream,
            stream_len,
            segment.data_offset,
            segment.data_length,
            location,
            "segment data",
        )
    }

    fn parts(&mut self) -> Result<(&mut R, &Record, u64), NitfError> {
        self.require(ReaderState::DataAccessible)?;
        match (self.stream.as_mut(), self.record.as_ref()) {
            (Some(stream), Some(record)) => Ok((stream, record, self.stream_len)),
            _ => Err(NitfError::InvalidState {
                expected: ReaderState::DataAccessible,
                actual: ReaderState::Closed,
            }),
        }
    }

    pub fn read_graphic(&mut self, index: usize) -> Result<Vec<u8>, NitfError> {
        let (stream, record, len) = self.parts()?;
        Self::data_of(stream, len, &record.graphics, index, Location::Graphic(index))
    }

    pub fn read_text(&mut self, index: usize) -> Result<Vec<u8>, NitfError> {
        let (stream, record, len) = self.parts()?;
        Self::data_of(stream, len, &record.texts, index, Location::Text(index))
    }

    pub fn read_data_extension(&mut self, index: usize) -> Result<Vec<u8>, NitfError> {
        let (stream, record, len) = self.parts()?;
        Self::data_of(
            stream,
            len,
            &record.data_extensions,
            index,
            Location::DataExtension(index),
        )
    }

    pub fn read_reserved_extension(&mut self, index: usize) -> Result<Vec<u8>, NitfError> {
        let (stream, record, len) = self.parts()?;
        Self::data_of(
            stream,
            len,
            &record.reserved_extensions,
            index,
            Location::ReservedExtension(index),
        )
    }

    /// Reads every still unread payload into the record, image data
    /// included, so the record can be written elsewhere.
    pub fn load_payloads(&mut self) -> Result<(), NitfError> {
        self.require(ReaderState::DataAccessible)?;
        let closed = self.closed();
        let (stream, record) = match (self.stream.as_mut(), self.record.as_mut()) {
            (Some(stream), Some(record)) => (stream, record),
            _ => return Err(closed),
        };
        let len = self.stream_len;

        fn load<R: Read + Seek, S>(
            stream: &mut R,
            len: u64,
            segments: &mut [Segment<S>],
            location: fn(usize) -> Location,
        ) -> Result<(), NitfError> {
            for (i, segment) in segments.iter_mut().enumerate() {
                if segment.payload == Payload::Unread {
                    let data = read_exact_at(
                        stream,
                        len,
                        segment.data_offset,
                        segment.data_length,
                        location(i),
                        "segment data",
                    )?;
                    segment.payload = Payload::Bytes(data);
                }
            }
            Ok(())
        }

        load(stream, len, &mut record.images, Location::Image)?;
        load(stream, len, &mut record.graphics, Location::Graphic)?;
        load(stream, len, &mut record.texts, Location::Text)?;
        load(stream, len, &mut record.data_extensions, Location::DataExtension)?;
        load(
            stream,
            len,
            &mut record.reserved_extensions,
            Location::ReservedExtension,
        )?;
        Ok(())
    }

    /// Pixel access to an uncompressed image segment.
    pub fn image(&mut self, index: usize) -> Result<ImageReader<'_, R>, NitfError> {
        let (stream, record, _) = self.parts()?;
        let location = Location::Image(index);
        let segment = record.images.get(index).ok_or_else(|| NitfError::Structural {
            location,
            reason: "no such segment".to_owned(),
        })?;
        let layout = ImageLayout::new(&segment.subheader, location)?;
        if layout.total_bytes() > segment.data_length {
            return Err(NitfError::Structural {
                location,
                reason: format!(
                    "layout needs {} bytes but the segment holds {}",
                    layout.total_bytes(),
                    segment.data_length
                ),
            });
        }
        Ok(ImageReader {
            stream,
            location,
            layout,
            data_offset: segment.data_offset,
            scratch: Vec::new(),
        })
    }

    /// Hands over the record, ending the reader.
    pub fn take_record(&mut self) -> Result<Record, NitfError> {
        self.require(ReaderState::DataAccessible)?;
        let record = self.record.take().ok_or_else(|| self.closed())?;
        self.close();
        Ok(record)
    }

    /// Releases the stream. Every later operation fails.
    pub fn close(&mut self) -> Option<R> {
        self.state = ReaderState::Closed;
        self.stream.take()
    }
}

/// Reads windows of one image segment.
pub struct ImageReader<'a, R> {
    stream: &'a mut R,
    location: Location,
    layout: ImageLayout,
    data_offset: u64,
    scratch: Vec<u8>,
}

impl<'a, R: Read + Seek> ImageReader<'a, R> {
    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    /// One buffer per requested band, each holding the window's pixels in
    /// row-major order.
    pub fn read(&mut self, window: &SubWindow) -> Result<Vec<Vec<u8>>, NitfError> {
        let capacity = window
            .output_rows()
            .checked_mul(window.output_cols())
            .and_then(|n| n.checked_mul(self.layout.bytes_per_pixel()))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(NitfError::SizeOverflow)?;
        let mut sinks: Vec<MemorySink> = window
            .bands
            .iter()
            .map(|_| MemorySink::with_capacity(capacity))
            .collect();
        {
            let mut refs: Vec<&mut dyn BandSink> =
                sinks.iter_mut().map(|s| s as &mut dyn BandSink).collect();
            self.read_into(window, &mut refs)?;
        }
        Ok(sinks.into_iter().map(MemorySink::into_inner).collect())
    }

    /// Streams the window a row at a time, band by band, into `sinks`.
    pub fn read_into(
        &mut self,
        window: &SubWindow,
        sinks: &mut [&mut dyn BandSink],
    ) -> Result<(), NitfError> {
        window.validate(
            self.layout.num_rows(),
            self.layout.num_cols(),
            self.layout.num_bands() as usize,
        )?;
        if sinks.len() != window.bands.len() {
            return Err(NitfError::InvalidWindow {
                reason: format!(
                    "{} sinks for {} bands",
                    sinks.len(),
                    window.bands.len()
                ),
            });
        }
        debug!("window read {:?}", window);

        let bpp = self.layout.bytes_per_pixel() as usize;
        let out_cols = window.output_cols();
        let mut row = vec![0u8; out_cols as usize * bpp];
        for r in 0..window.output_rows() {
            let image_row = window.start_row + r * window.row_skip();
            for (sink, &band) in sinks.iter_mut().zip(&window.bands) {
                self.read_row(band as u64, image_row, window, &mut row)?;
                sink.write(&row)?;
            }
        }
        Ok(())
    }

    // One output row of one band, one block column at a time.
    fn read_row(
        &mut self,
        band: u64,
        row: u64,
        window: &SubWindow,
        out: &mut [u8],
    ) -> Result<(), NitfError> {
        let bpp = self.layout.bytes_per_pixel();
        let stride = self.layout.column_stride();
        let block_cols = self.layout.block_cols();
        let col_skip = window.col_skip();
        let out_cols = window.output_cols();

        let mut k = 0;
        while k < out_cols {
            let col = window.start_col + k * col_skip;
            let block_end = (col / block_cols + 1) * block_cols;
            let n = (out_cols - k).min((block_end - col - 1) / col_skip + 1);
            let span = (n - 1) * col_skip * stride + bpp;

            self.scratch.resize(span as usize, 0);
            let offset = self.data_offset + self.layout.pixel_offset(band, row, col);
            self.stream.seek(SeekFrom::Start(offset))?;
            self.stream.read_exact(&mut self.scratch).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    NitfError::Structural {
                        location: self.location,
                        reason: format!("image data ends before offset {}", offset + span),
                    }
                } else {
                    NitfError::Io(e)
                }
            })?;

            for j in 0..n {
                let from = (j * col_skip * stride) as usize;
                let to = ((k + j) * bpp) as usize;
                out[to..to + bpp as usize]
                    .copy_from_slice(&self.scratch[from..from + bpp as usize]);
            }
            k += n;
        }
        Ok(())
    }
}
