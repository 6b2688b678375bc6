mod assembly;
mod cohesive;
mod friction;
mod io;
mod kinsrc;
mod refinement;
mod topology;
