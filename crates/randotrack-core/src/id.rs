use slotmap::new_key_type;

new_key_type! {
    /// Identifies a region (node) in the world graph.
    pub struct RegionId;

    /// Identifies an exit (directed edge) in the world graph.
    pub struct ExitId;

    /// Identifies a location inside a region.
    pub struct LocationId;
}
