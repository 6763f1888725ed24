// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOM view bindings.

use alloc::string::ToString;
use core::fmt::Display;

use framebatch_core::slot::{ViewBinding, ViewDetached};
use web_sys::Element;

/// Writes every committed value into an element's text content.
///
/// Reports [`ViewDetached`] once the element has been removed from the
/// document.
pub struct TextView {
    element: Element,
}

impl core::fmt::Debug for TextView {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextView")
            .field("element", &self.element.tag_name())
            .finish()
    }
}

impl TextView {
    /// Binds to an existing element.
    #[must_use]
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    /// Binds to the element with the given `id` in the current document.
    #[must_use]
    pub fn by_id(id: &str) -> Option<Self> {
        let element = web_sys::window()?.document()?.get_element_by_id(id)?;
        Some(Self::new(element))
    }

    /// Creates a `<span>` at the end of `container` and binds to it.
    #[must_use]
    pub fn append_to(container: &Element) -> Option<Self> {
        let doc = container.owner_document()?;
        let span = doc.create_element("span").ok()?;
        container.append_child(&span).ok()?;
        Some(Self::new(span))
    }

    /// Returns the bound element.
    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl<T: Display> ViewBinding<T> for TextView {
    fn value_committed(&mut self, value: &T) -> Result<(), ViewDetached> {
        if !self.element.is_connected() {
            return Err(ViewDetached);
        }
        self.element.set_text_content(Some(&value.to_string()));
        Ok(())
    }
}
