// Scenario tests for the two state machines


#[cfg(test)]
mod update_scenarios;
