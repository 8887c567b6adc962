//! Typed builders for the host's drawable primitive kinds.
//!
//! Thin staged-prop sugar over [`Element::primitive`]: each builder
//! stages the property names the host kind understands and converts into
//! a plain [`Element`]. Nothing here carries reconciliation behavior.

use crate::element::Element;
use crate::event::{EventKind, HostEvent};
use crate::props::PropValue;

macro_rules! object_builder {
    ($name:ident, $kind:literal) => {
        impl $name {
            pub fn new() -> Self {
                Self {
                    element: Element::primitive($kind),
                }
            }

            /// Stages an arbitrary host property.
            pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
                self.element = self.element.prop(key, value);
                self
            }

            pub fn x(self, x: f64) -> Self {
                self.prop("x", x)
            }

            pub fn y(self, y: f64) -> Self {
                self.prop("y", y)
            }

            pub fn w(self, w: f64) -> Self {
                self.prop("w", w)
            }

            pub fn h(self, h: f64) -> Self {
                self.prop("h", h)
            }

            /// Rotation center.
            pub fn center(self, cx: f64, cy: f64) -> Self {
                self.prop("cx", cx).prop("cy", cy)
            }

            /// Scale factors.
            pub fn scale(self, sx: f64, sy: f64) -> Self {
                self.prop("sx", sx).prop("sy", sy)
            }

            /// Opacity, 0.0 to 1.0.
            pub fn alpha(self, a: f64) -> Self {
                self.prop("a", a)
            }

            /// Rotation in degrees.
            pub fn rotation(self, r: f64) -> Self {
                self.prop("r", r)
            }

            pub fn id(self, id: impl Into<String>) -> Self {
                self.prop("id", id.into())
            }

            pub fn interactive(self, interactive: bool) -> Self {
                self.prop("interactive", interactive)
            }

            pub fn clip(self, clip: bool) -> Self {
                self.prop("clip", clip)
            }

            pub fn mask(self, mask: bool) -> Self {
                self.prop("mask", mask)
            }

            pub fn draw(self, draw: bool) -> Self {
                self.prop("draw", draw)
            }

            pub fn focus(self, focus: bool) -> Self {
                self.prop("focus", focus)
            }

            pub fn on(mut self, event: EventKind, callback: impl Fn(&HostEvent) + 'static) -> Self {
                self.element = self.element.on(event, callback);
                self
            }

            pub fn with_ref(mut self, hook: impl Fn(Option<&Element>) + 'static) -> Self {
                self.element = self.element.with_ref(hook);
                self
            }

            pub fn child(mut self, child: impl Into<Element>) -> Self {
                self.element = self.element.child(child);
                self
            }

            pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
                self.element = self.element.children(children);
                self
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<$name> for Element {
            fn from(builder: $name) -> Element {
                builder.element
            }
        }
    };
}

/// An invisible grouping object.
pub struct Object {
    element: Element,
}
object_builder!(Object, "object");

/// A solid or outlined rectangle.
pub struct Rect {
    element: Element,
}
object_builder!(Rect, "rect");

impl Rect {
    /// Fill color as 0xRRGGBBAA.
    pub fn fill_color(self, color: u32) -> Self {
        self.prop("fillColor", color)
    }

    /// Outline color as 0xRRGGBBAA.
    pub fn line_color(self, color: u32) -> Self {
        self.prop("lineColor", color)
    }

    pub fn line_width(self, width: f64) -> Self {
        self.prop("lineWidth", width)
    }
}

/// A single line of text.
pub struct Text {
    element: Element,
}
object_builder!(Text, "text");

impl Text {
    pub fn text(self, text: impl Into<String>) -> Self {
        self.prop("text", text.into())
    }

    /// Text color as 0xRRGGBBAA.
    pub fn text_color(self, color: u32) -> Self {
        self.prop("textColor", color)
    }

    pub fn pixel_size(self, size: i64) -> Self {
        self.prop("pixelSize", size)
    }

    pub fn font_url(self, url: impl Into<String>) -> Self {
        self.prop("fontUrl", url.into())
    }
}

/// Wrapped, aligned, truncatable text.
pub struct TextBox {
    element: Element,
}
object_builder!(TextBox, "textBox");

impl TextBox {
    pub fn text(self, text: impl Into<String>) -> Self {
        self.prop("text", text.into())
    }

    pub fn text_color(self, color: u32) -> Self {
        self.prop("textColor", color)
    }

    pub fn pixel_size(self, size: i64) -> Self {
        self.prop("pixelSize", size)
    }

    pub fn font_url(self, url: impl Into<String>) -> Self {
        self.prop("fontUrl", url.into())
    }

    pub fn word_wrap(self, wrap: bool) -> Self {
        self.prop("wordWrap", wrap)
    }

    pub fn ellipsis(self, ellipsis: bool) -> Self {
        self.prop("ellipsis", ellipsis)
    }

    /// One of [`crate::constants::truncation`].
    pub fn truncation(self, mode: i32) -> Self {
        self.prop("truncation", mode)
    }

    /// One of [`crate::constants::align_horizontal`].
    pub fn align_horizontal(self, align: i32) -> Self {
        self.prop("alignHorizontal", align)
    }

    /// One of [`crate::constants::align_vertical`].
    pub fn align_vertical(self, align: i32) -> Self {
        self.prop("alignVertical", align)
    }

    pub fn leading(self, leading: f64) -> Self {
        self.prop("leading", leading)
    }

    pub fn x_start_pos(self, pos: f64) -> Self {
        self.prop("xStartPos", pos)
    }

    pub fn x_stop_pos(self, pos: f64) -> Self {
        self.prop("xStopPos", pos)
    }
}

/// A bitmap image.
pub struct Image {
    element: Element,
}
object_builder!(Image, "image");

impl Image {
    pub fn url(self, url: impl Into<String>) -> Self {
        self.prop("url", url.into())
    }

    /// One of [`crate::constants::stretch`], for each axis.
    pub fn stretch(self, stretch_x: i32, stretch_y: i32) -> Self {
        self.prop("stretchX", stretch_x).prop("stretchY", stretch_y)
    }
}

/// A 9-slice scalable image.
pub struct Image9 {
    element: Element,
}
object_builder!(Image9, "image9");

impl Image9 {
    pub fn url(self, url: impl Into<String>) -> Self {
        self.prop("url", url.into())
    }

    pub fn insets(self, left: f64, top: f64, right: f64, bottom: f64) -> Self {
        self.prop("insetLeft", left)
            .prop("insetTop", top)
            .prop("insetRight", right)
            .prop("insetBottom", bottom)
    }
}
