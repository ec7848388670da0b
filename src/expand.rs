use std::collections::BTreeSet ;



/// Token selecting every known name.
pub const WILDCARD: &str = "*" ;
/// Prefix marking a token as an exclusion.
pub const EXCLUDE_PREFIX: char = '-' ;

/// Expands `requested` tokens against the `known` names.
///
/// The result is the explicit names, plus every known name if `*` is present,
/// minus every name given as `-name`. Token order does not change which names
/// are selected. For output stability, explicit names come first in token
/// order, followed by wildcard names in `known` order, without repeats.
/// Explicit names need not be known; lookups decide what to do with them.
pub fn expand_names<S: AsRef<str>>( known: impl IntoIterator<Item = impl AsRef<str>>, requested: &[S] ) -> Vec<String> {
    let excluded = requested.iter()
        .filter_map(| token | token.as_ref().strip_prefix( EXCLUDE_PREFIX ))
        .collect::<BTreeSet<_>>();
    let wildcard = requested.iter().any(| token | token.as_ref() == WILDCARD );

    let explicit = requested.iter()
        .map(| token | token.as_ref() )
        .filter(| token | *token != WILDCARD && !token.starts_with( EXCLUDE_PREFIX ))
        .map( str::to_string );
    let everything = known.into_iter()
        .map(| name | name.as_ref().to_string() )
        .filter(|_| wildcard );

    let mut seen = BTreeSet::new();
    explicit.chain( everything )
        .filter(| name | !excluded.contains( name.as_str() ))
        .filter(| name | seen.insert( name.clone() ))
        .collect()
}
