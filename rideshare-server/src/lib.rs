//! Rideshare route matching server.
//!
//! A web application that answers: "I want to get from here to there,
//! leaving around this time. Which drivers, ridden one after another,
//! can take me?"

pub mod audit;
pub mod cache;
pub mod domain;
pub mod geometry;
pub mod matching;
pub mod repository;
pub mod routing;
pub mod waypoints;
pub mod web;
