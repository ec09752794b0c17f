mod close_cause;
mod retry_budget;
