use crate::des::{DataExtensionSubheader, OverflowSection};
use crate::fields::Offset;
use crate::graphic::GraphicSubheader;
use crate::header::{ComponentInfo, FileHeader, MAX_SEGMENTS};
use crate::image::ImageSubheader;
use crate::overflow;
use crate::res::ReservedExtensionSubheader;
use crate::text::TextSubheader;
use crate::{Location, NitfError};
use imseg::SegmentRange;
use log::debug;
use std::ops::Range;
use tre::Extensions;

/// Data of a segment, when it is held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Still in the stream at `data_offset`.
    #[default]
    Unread,
    Bytes(Vec<u8>),
    /// Decoded contents of a TRE_OVERFLOW segment.
    Tres(Extensions),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment<S> {
    pub subheader: S,
    pub payload: Payload,
    /// Position of the data in the stream it was read from.
    pub data_offset: u64,
    pub data_length: u64,
}

impl<S> Segment<S> {
    pub fn new(subheader: S) -> Segment<S> {
        Segment {
            subheader,
            payload: Payload::Unread,
            data_offset: 0,
            data_length: 0,
        }
    }

    pub fn with_data(subheader: S, data: Vec<u8>) -> Segment<S> {
        Segment {
            payload: Payload::Bytes(data),
            ..Segment::new(subheader)
        }
    }
}

/// A file header and its segments. The header's per-group length tables
/// mirror the segment lists one to one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub header: FileHeader,
    pub images: Vec<Segment<ImageSubheader>>,
    pub graphics: Vec<Segment<GraphicSubheader>>,
    pub texts: Vec<Segment<TextSubheader>>,
    pub data_extensions: Vec<Segment<DataExtensionSubheader>>,
    pub reserved_extensions: Vec<Segment<ReservedExtensionSubheader>>,
}

fn check_count(
    field: &str,
    declared: usize,
    actual: usize,
) -> Result<(), NitfError> {
    if declared != actual {
        return Err(NitfError::Structural {
            location: Location::FileHeader,
            reason: format!("{} is {} but there are {} segments", field, declared, actual),
        });
    }
    if actual > MAX_SEGMENTS {
        return Err(NitfError::Structural {
            location: Location::FileHeader,
            reason: format!("{} segments exceed {} for {}", actual, MAX_SEGMENTS, field),
        });
    }
    Ok(())
}

fn check_offset(location: Location, field: &str, value: Offset) -> Result<(), NitfError> {
    if !value.is_representable() {
        return Err(NitfError::Structural {
            location,
            reason: format!("{} {:?} does not fit two 5-digit halves", field, value),
        });
    }
    Ok(())
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    pub fn new_image_segment(&mut self) -> &mut Segment<ImageSubheader> {
        self.header.images.push(ComponentInfo::default());
        self.images.push(Segment::new(ImageSubheader::default()));
        let last = self.images.len() - 1;
        &mut self.images[last]
    }

    pub fn new_graphic_segment(&mut self) -> &mut Segment<GraphicSubheader> {
        self.header.graphics.push(ComponentInfo::default());
        self.graphics.push(Segment::new(GraphicSubheader::default()));
        let last = self.graphics.len() - 1;
        &mut self.graphics[last]
    }

    pub fn new_text_segment(&mut self) -> &mut Segment<TextSubheader> {
        self.header.texts.push(ComponentInfo::default());
        self.texts.push(Segment::new(TextSubheader::default()));
        let last = self.texts.len() - 1;
        &mut self.texts[last]
    }

    pub fn new_data_extension_segment(&mut self) -> &mut Segment<DataExtensionSubheader> {
        self.header.data_extensions.push(ComponentInfo::default());
        self.data_extensions
            .push(Segment::new(DataExtensionSubheader::default()));
        let last = self.data_extensions.len() - 1;
        &mut self.data_extensions[last]
    }

    pub fn new_reserved_extension_segment(&mut self) -> &mut Segment<ReservedExtensionSubheader> {
        self.header.reserved_extensions.push(ComponentInfo::default());
        self.reserved_extensions
            .push(Segment::new(ReservedExtensionSubheader::default()));
        let last = self.reserved_extensions.len() - 1;
        &mut self.reserved_extensions[last]
    }

    /// Appends one image segment per range, each a copy of `template` with
    /// NROWS, ILOC and blocking adjusted. Segments attach in a chain: the
    /// first at level 0, each next one to the display level of the previous.
    /// The template's NPPBV/NPPBH give the requested block size, 0 meaning
    /// unblocked.
    pub fn new_segmented_image(
        &mut self,
        template: &ImageSubheader,
        ranges: &[SegmentRange],
    ) -> Range<usize> {
        let start = self.images.len();
        let mut previous_level: Option<u64> = None;
        for range in ranges {
            let mut subheader = template.clone();
            subheader.num_rows = range.num_rows();
            subheader.location = Offset::new(range.row_offset() as i64, 0);
            subheader.set_blocking(template.block_rows, template.block_cols);
            match previous_level {
                None => {
                    subheader.display_level = template.display_level;
                    subheader.attachment_level = 0;
                }
                Some(level) => {
                    subheader.display_level = level + 1;
                    subheader.attachment_level = level;
                }
            }
            previous_level = Some(subheader.display_level);
            debug!(
                "segmented image part at row {} with {} rows, ILOC {}",
                range.first_row(),
                range.num_rows(),
                range.iloc()
            );
            self.header.images.push(ComponentInfo::default());
            self.images.push(Segment::new(subheader));
        }
        start..self.images.len()
    }

    pub fn remove_image_segment(&mut self, index: usize) -> Option<Segment<ImageSubheader>> {
        if index >= self.images.len() {
            return None;
        }
        self.header.images.remove(index);
        overflow::forget_owner(
            self,
            &[
                OverflowSection::UserDefinedImage,
                OverflowSection::ExtendedImage,
            ],
            index,
        );
        Some(self.images.remove(index))
    }

    pub fn remove_graphic_segment(&mut self, index: usize) -> Option<Segment<GraphicSubheader>> {
        if index >= self.graphics.len() {
            return None;
        }
        self.header.graphics.remove(index);
        overflow::forget_owner(self, &[OverflowSection::ExtendedGraphic], index);
        Some(self.graphics.remove(index))
    }

    pub fn remove_text_segment(&mut self, index: usize) -> Option<Segment<TextSubheader>> {
        if index >= self.texts.len() {
            return None;
        }
        self.header.texts.remove(index);
        overflow::forget_owner(self, &[OverflowSection::ExtendedText], index);
        Some(self.texts.remove(index))
    }

    pub fn remove_data_extension_segment(
        &mut self,
        index: usize,
    ) -> Option<Segment<DataExtensionSubheader>> {
        if index >= self.data_extensions.len() {
            return None;
        }
        self.header.data_extensions.remove(index);
        Some(self.data_extensions.remove(index))
    }

    pub fn remove_reserved_extension_segment(
        &mut self,
        index: usize,
    ) -> Option<Segment<ReservedExtensionSubheader>> {
        if index >= self.reserved_extensions.len() {
            return None;
        }
        self.header.reserved_extensions.remove(index);
        Some(self.reserved_extensions.remove(index))
    }

    /// Checks the header counts against the segment lists, the per-group
    /// maximum and the location fields.
    pub fn validate_counts(&self) -> Result<(), NitfError> {
        check_count("NUMI", self.header.images.len(), self.images.len())?;
        check_count("NUMS", self.header.graphics.len(), self.graphics.len())?;
        check_count("NUMT", self.header.texts.len(), self.texts.len())?;
        check_count(
            "NUMDES",
            self.header.data_extensions.len(),
            self.data_extensions.len(),
        )?;
        check_count(
            "NUMRES",
            self.header.reserved_extensions.len(),
            self.reserved_extensions.len(),
        )?;

        for (i, image) in self.images.iter().enumerate() {
            check_offset(Location::Image(i), "ILOC", image.subheader.location)?;
        }
        for (i, graphic) in self.graphics.iter().enumerate() {
            let location = Location::Graphic(i);
            check_offset(location, "SLOC", graphic.subheader.location)?;
            check_offset(location, "SBND1", graphic.subheader.first_bound)?;
            check_offset(location, "SBND2", graphic.subheader.second_bound)?;
        }
        Ok(())
    }

    /// Moves TREs that do not fit their section into TRE_OVERFLOW segments.
    /// Returns the number of overflow segments now in the record.
    pub fn enforce_limits(&mut self) -> Result<usize, NitfError> {
        overflow::enforce_limits(self)
    }

    /// Moves overflowed TREs back to their owners where they fit.
    pub fn reconcile(&mut self) -> Result<(), NitfError> {
        overflow::reconcile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imseg::{ImageSegmentComputer, Limits};

    #[test]
    fn test_new_segments_keep_counts() {
        let mut record = Record::new();
        record.new_image_segment().subheader.num_rows = 3;
        record.new_text_segment();
        record.new_data_extension_segment();
        assert_eq!(record.header.images.len(), 1);
        assert_eq!(record.header.texts.len(), 1);
        assert!(record.validate_counts().is_ok());

        assert!(record.remove_text_segment(0).is_some());
        assert!(record.remove_text_segment(0).is_none());
        assert!(record.validate_counts().is_ok());
    }

    #[test]
    fn test_count_mismatch() {
        let mut record = Record::new();
        record.new_graphic_segment();
        record.header.graphics.clear();
        assert!(matches!(
            record.validate_counts(),
            Err(NitfError::Structural {
                location: Location::FileHeader,
                ..
            })
        ));
    }

    #[test]
    fn test_iloc_out_of_range() {
        let mut record = Record::new();
        record.new_image_segment().subheader.location = Offset::new(100_000, 0);
        assert!(matches!(
            record.validate_counts(),
            Err(NitfError::Structural {
                location: Location::Image(0),
                ..
            })
        ));
    }

    #[test]
    fn test_segmented_image_chain() {
        let computer =
            ImageSegmentComputer::blocked(383_735, 37_287, 1, 1024, 1024, Limits::default())
                .unwrap();
        let template = ImageSubheader {
            num_cols: 37_287,
            block_rows: 1024,
            block_cols: 1024,
            display_level: 5,
            ..ImageSubheader::default()
        };

        let mut record = Record::new();
        let range = record.new_segmented_image(&template, computer.segments());
        assert_eq!(range, 0..4);
        assert_eq!(record.header.images.len(), 4);

        let levels: Vec<(u64, u64)> = record
            .images
            .iter()
            .map(|s| (s.subheader.display_level, s.subheader.attachment_level))
            .collect();
        assert_eq!(levels, vec![(5, 0), (6, 5), (7, 6), (8, 7)]);

        let last = &record.images[3].subheader;
        assert_eq!(last.num_rows, 85_751);
        assert_eq!(last.location, Offset::new(99_328, 0));
        assert_eq!(last.blocks_per_col, 84);
        assert_eq!(last.blocks_per_row, 37);
        assert!(record.validate_counts().is_ok());
    }
}
