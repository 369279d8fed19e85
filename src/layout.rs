//! Page geometry, the document flow model and pagination
//!
//! A [`Section`] is a flat list of paragraphs, images and page breaks that
//! shares one [`PageSetup`]. [`paginate`] flows it top to bottom into
//! [`Page`]s of absolutely positioned items, which the renderer then writes.

use crate::pdf::fonts::{wrap_text, Font, StandardFont};
use crate::pdf::xobject::XObjectHandle;

/// Below this much free space an image goes to a fresh page instead of
/// being shrunk to fit (2in)
const MIN_SHRUNK_HEIGHT: f32 = 144.0;

/// Simple length type in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length(pub f64);

impl Length {
    /// Create a length from millimeters
    pub fn from_mm(mm: f64) -> Self {
        Length(mm)
    }

    /// Create a length from inches
    pub fn from_inches(inches: f64) -> Self {
        Length(inches * 25.4)
    }

    /// Create a length from points (1/72 inch)
    pub fn from_pt(pt: f64) -> Self {
        Length(pt * 25.4 / 72.0)
    }

    /// Get the value in millimeters
    pub fn mm(&self) -> f64 {
        self.0
    }

    /// Get the value in points (1/72 inch)
    pub fn pt(&self) -> f64 {
        self.0 * 72.0 / 25.4
    }
}

/// Page dimensions
#[derive(Debug, Clone, Copy)]
pub struct PageDimensions {
    pub width: Length,
    pub height: Length,
}

impl PageDimensions {
    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self {
            width: Length::from_inches(8.5),
            height: Length::from_inches(11.0),
        }
    }
}

/// Margins for page content
#[derive(Debug, Clone, Copy)]
pub struct Margins {
    pub top: Length,
    pub bottom: Length,
    pub left: Length,
    pub right: Length,
}

impl Margins {
    /// Create margins with same value on all sides
    pub fn uniform(margin: Length) -> Self {
        Self {
            top: margin,
            bottom: margin,
            left: margin,
            right: margin,
        }
    }

    /// Narrow margins (0.5 inches)
    pub fn narrow() -> Self {
        Self::uniform(Length::from_inches(0.5))
    }
}

/// Page size and margins shared by every page of a section
#[derive(Debug, Clone, Copy)]
pub struct PageSetup {
    pub size: PageDimensions,
    pub margins: Margins,
}

impl PageSetup {
    /// Letter with half-inch margins all round
    pub fn letter() -> Self {
        Self {
            size: PageDimensions::letter(),
            margins: Margins::narrow(),
        }
    }

    pub fn page_width(&self) -> f32 {
        self.size.width.pt() as f32
    }

    pub fn page_height(&self) -> f32 {
        self.size.height.pt() as f32
    }

    /// Width between the left and right margins, in points
    pub fn content_width(&self) -> f32 {
        (self.size.width.pt() - self.margins.left.pt() - self.margins.right.pt()) as f32
    }

    /// Height between the top and bottom margins, in points
    pub fn content_height(&self) -> f32 {
        (self.size.height.pt() - self.margins.top.pt() - self.margins.bottom.pt()) as f32
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::letter()
    }
}

/// Horizontal alignment within the content area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Left edge of an item `width` wide inside `[left, left + available]`
    pub(crate) fn x(&self, left: f32, available: f32, width: f32) -> f32 {
        match self {
            Alignment::Left => left,
            Alignment::Center => left + (available - width) / 2.0,
            Alignment::Right => left + available - width,
        }
    }
}

/// A run of text set in one font
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub text: String,
    pub font: Font,
    pub size: f32,
    pub alignment: Alignment,
}

impl Paragraph {
    /// Body text: 10pt Helvetica, left aligned
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            font: Font::Standard(StandardFont::Helvetica),
            size: 10.0,
            alignment: Alignment::Left,
        }
    }

    /// A blank line
    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn with_font(mut self, family: &str, bold: bool) -> Self {
        self.font = Font::Standard(StandardFont::resolve(family, bold));
        self
    }

    /// Set a specific face, e.g. an embedded TrueType font
    pub fn with_face(mut self, font: Font) -> Self {
        self.font = font;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Append text to the end of the paragraph
    pub fn add_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn line_height(&self) -> f32 {
        self.size * 1.2
    }
}

/// An XObject drawn at a fixed width with its aspect ratio locked
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageElement {
    pub xobject: XObjectHandle,
    /// Requested width in points
    pub width: f32,
    pub alignment: Alignment,
}

/// One entry of the section flow
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Paragraph(Paragraph),
    Image(ImageElement),
    PageBreak,
}

/// A piece of footer text
#[derive(Debug, Clone, PartialEq)]
pub enum FooterPart {
    Text(String),
    /// Current page number, 1-based
    PageNumber,
    /// Total page count of the document
    PageCount,
}

/// Footer repeated on every page
#[derive(Debug, Clone, PartialEq)]
pub struct Footer {
    pub parts: Vec<FooterPart>,
    pub font: StandardFont,
    pub size: f32,
    pub alignment: Alignment,
}

impl Footer {
    /// Centered `--Page X of Y--`
    pub fn page_x_of_y() -> Self {
        Self {
            parts: vec![
                FooterPart::Text("--Page ".to_string()),
                FooterPart::PageNumber,
                FooterPart::Text(" of ".to_string()),
                FooterPart::PageCount,
                FooterPart::Text("--".to_string()),
            ],
            font: StandardFont::Helvetica,
            size: 10.0,
            alignment: Alignment::Center,
        }
    }

    /// Resolve the fields for one page
    pub fn text(&self, page_number: usize, page_count: usize) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                FooterPart::Text(text) => text.clone(),
                FooterPart::PageNumber => page_number.to_string(),
                FooterPart::PageCount => page_count.to_string(),
            })
            .collect()
    }
}

/// Ordered flow of elements sharing one page setup
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub setup: PageSetup,
    pub elements: Vec<Element>,
    pub footer: Option<Footer>,
}

impl Section {
    pub fn new(setup: PageSetup) -> Self {
        Self {
            setup,
            elements: Vec::new(),
            footer: None,
        }
    }

    /// Append a paragraph and return its index for later edits
    pub fn add_paragraph(&mut self, paragraph: Paragraph) -> usize {
        self.elements.push(Element::Paragraph(paragraph));
        self.elements.len() - 1
    }

    /// Paragraph previously added at `index`
    pub fn paragraph_mut(&mut self, index: usize) -> Option<&mut Paragraph> {
        match self.elements.get_mut(index) {
            Some(Element::Paragraph(paragraph)) => Some(paragraph),
            _ => None,
        }
    }

    pub fn add_image(&mut self, image: ImageElement) {
        self.elements.push(Element::Image(image));
    }

    pub fn add_page_break(&mut self) {
        self.elements.push(Element::PageBreak);
    }
}

/// Something drawn at an absolute position (PDF coordinates, origin bottom-left)
#[derive(Debug, Clone, PartialEq)]
pub enum PlacedItem {
    /// One line of text; `y` is the baseline
    Text {
        x: f32,
        y: f32,
        text: String,
        font: Font,
        size: f32,
    },
    /// An XObject filling the box with lower-left corner (x, y)
    XObject {
        handle: XObjectHandle,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// One laid-out page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<PlacedItem>,
}

/// Vertical cursor over the pages being filled
struct Flow<'a> {
    setup: &'a PageSetup,
    pages: Vec<Page>,
    cursor: f32,
}

impl<'a> Flow<'a> {
    fn new(setup: &'a PageSetup) -> Self {
        Self {
            setup,
            pages: vec![Page::default()],
            cursor: Self::top(setup),
        }
    }

    fn top(setup: &PageSetup) -> f32 {
        setup.page_height() - setup.margins.top.pt() as f32
    }

    fn bottom(&self) -> f32 {
        self.setup.margins.bottom.pt() as f32
    }

    /// Space left above the bottom margin
    fn remaining(&self) -> f32 {
        self.cursor - self.bottom()
    }

    fn at_top(&self) -> bool {
        self.cursor >= Self::top(self.setup)
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = Self::top(self.setup);
    }

    /// Reserve `height` points, moving to a fresh page if it doesn't fit
    fn reserve(&mut self, height: f32) -> f32 {
        if self.cursor - height < self.bottom() && !self.at_top() {
            self.new_page();
        }
        let top = self.cursor;
        self.cursor -= height;
        top
    }

    fn place(&mut self, item: PlacedItem) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }
}

/// Flow a section onto pages
///
/// Text is wrapped to the content width. Images keep their aspect ratio:
/// they are drawn at the requested width (capped at the content width) and
/// scaled down further to fit the space left on the page, so a tall receipt
/// stays on the page with its title. Only when less than two inches remain
/// does an image move to the next page, scaled to a full content area.
pub fn paginate(section: &Section) -> Vec<Page> {
    let setup = &section.setup;
    let left = setup.margins.left.pt() as f32;
    let content_width = setup.content_width();
    let content_height = setup.content_height();
    let mut flow = Flow::new(setup);

    for element in &section.elements {
        match element {
            Element::Paragraph(paragraph) => {
                let lines = wrap_text(&paragraph.text, &paragraph.font, paragraph.size, content_width);
                for line in lines {
                    let top = flow.reserve(paragraph.line_height());
                    if line.is_empty() {
                        continue;
                    }
                    let width = paragraph.font.text_width(&line, paragraph.size);
                    flow.place(PlacedItem::Text {
                        x: paragraph.alignment.x(left, content_width, width),
                        y: top - paragraph.size,
                        text: line,
                        font: paragraph.font.clone(),
                        size: paragraph.size,
                    });
                }
            }
            Element::Image(image) => {
                let ratio = image.xobject.aspect_ratio();
                let mut width = image.width.min(content_width);
                let mut height = width * ratio;
                let limit = if flow.at_top() || flow.remaining() >= MIN_SHRUNK_HEIGHT {
                    flow.remaining()
                } else {
                    content_height
                };
                if height > limit && ratio > 0.0 {
                    height = limit;
                    width = height / ratio;
                }

                let top = flow.reserve(height);
                flow.place(PlacedItem::XObject {
                    handle: image.xobject,
                    x: image.alignment.x(left, content_width, width),
                    y: top - height,
                    width,
                    height,
                });
            }
            Element::PageBreak => flow.new_page(),
        }
    }

    flow.pages
}
