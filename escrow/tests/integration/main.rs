mod factory;
mod funding;
mod liquidation;
mod redemption;
mod timeouts;
