mod nondimensional;
mod timehistory;
mod units;
