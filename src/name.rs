//! Dotted identifiers.
//!
//! A [`QualifiedName`] such as `plugins.chat.greeter` names both loadable units
//! (where each segment is a directory or file on a search root) and plugins.

use std::borrow::Borrow ;
use std::fmt ;
use std::str::FromStr ;
use std::sync::Arc ;
use thiserror::Error ;



/// Reasons a string is not a valid [`QualifiedName`].
#[derive( Error, Debug, Clone, PartialEq, Eq )]
pub enum NameError {
    /// The name has no segments.
    #[error( "Empty qualified name" )] Empty,
    /// One segment is empty or contains characters outside `[A-Za-z0-9_-]`,
    /// or starts with a digit or dash.
    #[error( "Invalid segment '{segment}' in '{name}'" )] InvalidSegment { name: String, segment: String },
}

/// An immutable, dot-delimited identifier path.
///
/// Cloning is cheap; the underlying string is shared.
#[derive( Clone, PartialEq, Eq, PartialOrd, Ord, Hash )]
pub struct QualifiedName( Arc<str> );

impl QualifiedName {

    /// Parses and validates a dotted name.
    ///
    /// # Errors
    /// Returns [`NameError`] if the name is empty or any segment is malformed.
    pub fn new( name: &str ) -> Result<Self, NameError> {
        if name.is_empty() { return Err( NameError::Empty ) }
        match name.split( '.' ).find(| segment | !is_valid_segment( segment )) {
            Some( segment ) => Err( NameError::InvalidSegment { name: name.to_string(), segment: segment.to_string() }),
            None => Ok( Self( Arc::from( name ))),
        }
    }

    /// Whether `segment` could appear between two dots of a qualified name.
    #[inline] pub fn is_valid_segment( segment: &str ) -> bool { is_valid_segment( segment ) }

    #[inline] pub fn as_str( &self ) -> &str { &self.0 }

    /// Segments from outermost to innermost.
    #[inline] pub fn segments( &self ) -> impl Iterator<Item = &str> + '_ { self.0.split( '.' ) }

    /// The innermost segment.
    #[inline] pub fn last( &self ) -> &str {
        self.0.rsplit_once( '.' ).map_or( &self.0, |( _, last )| last )
    }

    /// The enclosing name, or `None` for a single-segment name.
    pub fn parent( &self ) -> Option<Self> {
        self.0.rsplit_once( '.' ).map(|( parent, _ )| Self( Arc::from( parent )))
    }

    /// Appends one segment.
    ///
    /// # Errors
    /// Returns [`NameError::InvalidSegment`] if `segment` is not a valid single segment.
    pub fn child( &self, segment: &str ) -> Result<Self, NameError> {
        match is_valid_segment( segment ) {
            true => Ok( Self( Arc::from( format!( "{}.{}", self.0, segment )))),
            false => Err( NameError::InvalidSegment { name: format!( "{}.{}", self.0, segment ), segment: segment.to_string() }),
        }
    }

    /// Whether `self` equals `ancestor` or lies underneath it.
    pub fn is_within( &self, ancestor: &QualifiedName ) -> bool {
        self.0.strip_prefix( &*ancestor.0 )
            .is_some_and(| rest | rest.is_empty() || rest.starts_with( '.' ))
    }

}

fn is_valid_segment( segment: &str ) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some( first ) if first.is_ascii_alphabetic() || first == '_' =>
            chars.all(| c | c.is_ascii_alphanumeric() || c == '_' || c == '-' ),
        _ => false,
    }
}

impl FromStr for QualifiedName {
    type Err = NameError ;
    fn from_str( s: &str ) -> Result<Self, Self::Err> { Self::new( s ) }
}

impl TryFrom<&str> for QualifiedName {
    type Error = NameError ;
    fn try_from( value: &str ) -> Result<Self, Self::Error> { Self::new( value ) }
}

impl AsRef<str> for QualifiedName {
    fn as_ref( &self ) -> &str { &self.0 }
}

impl Borrow<str> for QualifiedName {
    fn borrow( &self ) -> &str { &self.0 }
}

impl fmt::Display for QualifiedName {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result { f.write_str( &self.0 )}
}

impl fmt::Debug for QualifiedName {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result { write!( f, "QualifiedName({})", self.0 )}
}
