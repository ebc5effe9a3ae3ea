#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Navigate(Direction),
    EnterFilterMode,
    ExitFilterMode,
    ClearFilter,
    UpdateFilter(String),
    CycleSort,
    ReverseSort,
    ToggleTree,
    ToggleCollapse(u32),
    ToggleDetail,
    ResetNetTotals,
    RescaleNet,
    ToggleHelp,
    None,
}
